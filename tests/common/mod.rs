#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use naqshi_inventory::{
    models::{ItemForm, ItemRecord, Settings},
    persistence::{JsonFileGateway, MemoryGateway, StorageConfig},
    services::inventory::InventoryStore,
};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// A filled-in form for `item_id`.
pub fn item_form(item_id: &str, item_type: &str) -> ItemForm {
    ItemForm {
        store_name: "X".into(),
        item_id: item_id.into(),
        item_type: item_type.into(),
        weight: "5".into(),
        purity: "22K".into(),
        total_price: "300".into(),
        ..ItemForm::default()
    }
}

/// A stored record, as an import file or a previous session would hold it.
pub fn item_record(item_id: &str, item_type: &str, purity: &str) -> ItemRecord {
    let now = Utc::now();
    ItemRecord {
        id: item_id.into(),
        store_name: "X".into(),
        item_id: item_id.into(),
        item_type: item_type.into(),
        weight: Decimal::new(25, 1),
        purity: purity.into(),
        total_price: Decimal::new(12_500, 2),
        size: None,
        color: None,
        hallmark: None,
        description: None,
        date_created: now,
        date_modified: now,
    }
}

/// Store over an empty in-memory gateway.
pub async fn memory_store() -> (InventoryStore, Arc<MemoryGateway>) {
    let gateway = Arc::new(MemoryGateway::new());
    let store = InventoryStore::open(gateway.clone(), None).await;
    (store, gateway)
}

/// Store over an in-memory gateway seeded with `records`.
pub async fn seeded_store(records: Vec<ItemRecord>) -> (InventoryStore, Arc<MemoryGateway>) {
    let gateway = Arc::new(MemoryGateway::with_state(records, Settings::default()));
    let store = InventoryStore::open(gateway.clone(), None).await;
    (store, gateway)
}

/// JSON file gateway rooted in a fresh temporary directory.
pub fn file_gateway() -> (Arc<JsonFileGateway>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let gateway = JsonFileGateway::new(
        StorageConfig::in_dir(dir.path().join("data")),
        Settings::default(),
    );
    (Arc::new(gateway), dir)
}
