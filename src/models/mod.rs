// Inventory records and store settings
pub mod jewelry_item;
pub mod store_settings;

// Form input and import/export documents
pub mod inventory_snapshot;
pub mod item_form;

pub use inventory_snapshot::{ImportDocument, InventorySnapshot, SNAPSHOT_VERSION};
pub use item_form::{
    is_selectable_type, FieldDefault, FieldSpec, ItemForm, ValidatedItem, ITEM_FIELDS,
};
pub use jewelry_item::{
    format_item_id, parse_item_sequence, ItemRecord, JewelryType, ITEM_ID_PREFIX,
    OTHER_ITEM_TYPE,
};
pub use store_settings::{Settings, DEFAULT_STORE_NAME};
