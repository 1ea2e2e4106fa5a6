//! Naqshi inventory library
//!
//! Core of a jewelry retailer's inventory manager: item records with issued
//! `NGP` ids, a JSON file persistence gateway, import/export snapshots and
//! QR-coded item labels. Front ends own an [`InventoryStore`] and drive it
//! through its async operations.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod persistence;
pub mod qr;
pub mod services;

pub use errors::{ErrorReport, ServiceError};
pub use events::{EventSender, StoreEvent};
pub use models::{ImportDocument, InventorySnapshot, ItemForm, ItemRecord, Settings};
pub use persistence::{
    DestinationPicker, FixedDestination, JsonFileGateway, MemoryGateway, SaveOutcome,
    StorageConfig, StorageGateway,
};
pub use qr::{LabelRenderer, QrPayload};
pub use services::inventory::{Committed, InventoryFilter, InventoryStore, Page};
