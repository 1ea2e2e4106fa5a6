pub mod analytics;
pub mod inventory;
pub mod pricing;
