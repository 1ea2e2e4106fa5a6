use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::json_files::decode_data_url;
use super::{DestinationPicker, SaveOutcome, StorageGateway, StoredState, IMAGE_FILTERS};
use crate::errors::ServiceError;
use crate::models::{InventorySnapshot, ItemRecord, Settings};

/// In-process gateway for tests and dry runs. Files written through it live in
/// a map keyed by path.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<StoredState>,
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(inventory: Vec<ItemRecord>, settings: Settings) -> Self {
        Self {
            state: Mutex::new(StoredState {
                inventory,
                settings,
            }),
            ..Self::default()
        }
    }

    /// Makes every subsequent `save` report a failure.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> StoredState {
        lock(&self.state).clone()
    }

    pub fn put_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        lock(&self.files).insert(path.into(), contents.into());
    }

    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn save(&self, inventory: &[ItemRecord], settings: &Settings) -> SaveOutcome {
        if self.fail_saves.load(Ordering::SeqCst) {
            return SaveOutcome::failed("simulated write failure");
        }
        *lock(&self.state) = StoredState {
            inventory: inventory.to_vec(),
            settings: settings.clone(),
        };
        self.saves.fetch_add(1, Ordering::SeqCst);
        SaveOutcome::ok()
    }

    async fn load(&self) -> StoredState {
        self.stored()
    }

    async fn save_image(
        &self,
        png_data_url: &str,
        suggested_file_name: &str,
        picker: &dyn DestinationPicker,
    ) -> SaveOutcome {
        let Some(path) = picker.pick_destination(suggested_file_name, IMAGE_FILTERS) else {
            return SaveOutcome::cancelled();
        };
        match decode_data_url(png_data_url) {
            Ok(bytes) => {
                self.put_file(path.clone(), bytes);
                SaveOutcome::written_to(path)
            }
            Err(err) => SaveOutcome::failed(err.to_string()),
        }
    }

    async fn write_export(&self, snapshot: &InventorySnapshot, path: &Path) -> SaveOutcome {
        match serde_json::to_vec_pretty(snapshot) {
            Ok(json) => {
                self.put_file(path, json);
                SaveOutcome::written_to(path)
            }
            Err(err) => SaveOutcome::failed(err.to_string()),
        }
    }

    async fn read_import(&self, path: &Path) -> Result<String, ServiceError> {
        let bytes = self
            .file(path)
            .ok_or_else(|| ServiceError::ImportError(format!("{}: no such file", path.display())))?;
        String::from_utf8(bytes).map_err(|e| ServiceError::ImportError(e.to_string()))
    }
}
