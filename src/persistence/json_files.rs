use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::{DestinationPicker, SaveOutcome, StorageGateway, StoredState, IMAGE_FILTERS};
use crate::errors::ServiceError;
use crate::models::{parse_item_sequence, InventorySnapshot, ItemRecord, Settings};
use crate::qr::PNG_DATA_URL_PREFIX;

/// Default file names inside the data directory.
pub const DEFAULT_INVENTORY_FILE: &str = "naqshi-store-data.json";
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Locations of the two persisted documents
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding both documents; created on first save
    pub data_dir: PathBuf,
    /// Inventory document file name
    pub inventory_file: String,
    /// Settings document file name
    pub settings_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::in_dir("data")
    }
}

impl StorageConfig {
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            inventory_file: DEFAULT_INVENTORY_FILE.to_string(),
            settings_file: DEFAULT_SETTINGS_FILE.to_string(),
        }
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.data_dir.join(&self.inventory_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.settings_file)
    }
}

/// Gateway backed by two pretty-printed JSON files.
///
/// Saves stage both documents next to their targets before committing either.
/// If the settings document cannot be committed after the inventory document
/// was, the previous inventory document is restored.
#[derive(Debug, Clone)]
pub struct JsonFileGateway {
    config: StorageConfig,
    default_settings: Settings,
}

impl JsonFileGateway {
    pub fn new(config: StorageConfig, default_settings: Settings) -> Self {
        Self {
            config,
            default_settings,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    async fn write_documents(
        &self,
        inventory: &[ItemRecord],
        settings: &Settings,
    ) -> Result<(), ServiceError> {
        fs::create_dir_all(&self.config.data_dir).await?;

        let inventory_path = self.config.inventory_path();
        let settings_path = self.config.settings_path();
        let inventory_stage = with_suffix(&inventory_path, "tmp");
        let settings_stage = with_suffix(&settings_path, "tmp");
        let inventory_backup = with_suffix(&inventory_path, "bak");

        let inventory_json = serde_json::to_string_pretty(inventory)?;
        let settings_json = serde_json::to_string_pretty(settings)?;

        if let Err(err) = stage(&inventory_stage, &inventory_json, &settings_stage, &settings_json).await
        {
            discard(&[&inventory_stage, &settings_stage]).await;
            return Err(err.into());
        }

        let had_previous = fs::metadata(&inventory_path).await.is_ok();
        if had_previous {
            if let Err(err) = fs::copy(&inventory_path, &inventory_backup).await {
                discard(&[&inventory_stage, &settings_stage]).await;
                return Err(err.into());
            }
        }

        if let Err(err) = fs::rename(&inventory_stage, &inventory_path).await {
            discard(&[&inventory_stage, &settings_stage, &inventory_backup]).await;
            return Err(err.into());
        }

        if let Err(err) = fs::rename(&settings_stage, &settings_path).await {
            let rollback = if had_previous {
                fs::rename(&inventory_backup, &inventory_path).await
            } else {
                fs::remove_file(&inventory_path).await
            };
            discard(&[&settings_stage]).await;
            return Err(ServiceError::PersistenceError(match rollback {
                Ok(()) => format!("settings not written, inventory rolled back: {}", err),
                Err(rollback_err) => format!(
                    "settings not written ({}), inventory rollback failed: {}",
                    err, rollback_err
                ),
            }));
        }

        if had_previous {
            discard(&[&inventory_backup]).await;
        }
        Ok(())
    }

    async fn read_raw(&self, path: &Path) -> RawDocument {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Document absent; using defaults");
                return RawDocument::Absent;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Unreadable document; using defaults");
                return RawDocument::Corrupt;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => RawDocument::Parsed(value),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Corrupt document; using defaults");
                RawDocument::Corrupt
            }
        }
    }

    /// Loads every record that parses. Records that do not are skipped, and the
    /// highest id sequence among them is returned so it is never reissued.
    async fn load_inventory(&self) -> (Vec<ItemRecord>, u32) {
        let path = self.config.inventory_path();
        let elements = match self.read_raw(&path).await {
            RawDocument::Absent => return (Vec::new(), 0),
            RawDocument::Corrupt => {
                preserve_corrupt(&path).await;
                return (Vec::new(), 0);
            }
            RawDocument::Parsed(Value::Array(elements)) => elements,
            RawDocument::Parsed(_) => {
                warn!(path = %path.display(), "Inventory document is not an array; using defaults");
                preserve_corrupt(&path).await;
                return (Vec::new(), 0);
            }
        };

        let mut inventory = Vec::with_capacity(elements.len());
        let mut skipped_sequence = 0;
        let mut skipped = 0usize;
        for (index, element) in elements.into_iter().enumerate() {
            let sequence = raw_sequence(&element);
            match serde_json::from_value::<ItemRecord>(element) {
                Ok(record) => inventory.push(record),
                Err(err) => {
                    warn!(path = %path.display(), index, error = %err, "Skipping unreadable record");
                    skipped += 1;
                    skipped_sequence = skipped_sequence.max(sequence.unwrap_or(0));
                }
            }
        }
        if skipped > 0 {
            preserve_corrupt(&path).await;
        }
        (inventory, skipped_sequence)
    }

    async fn load_settings(&self) -> Settings {
        let path = self.config.settings_path();
        let stored = match self.read_raw(&path).await {
            RawDocument::Absent => return self.default_settings.clone(),
            RawDocument::Corrupt => {
                preserve_corrupt(&path).await;
                return self.default_settings.clone();
            }
            RawDocument::Parsed(value) => value,
        };
        match merge_settings(&self.default_settings, stored) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Unexpected settings shape; using defaults");
                preserve_corrupt(&path).await;
                self.default_settings.clone()
            }
        }
    }
}

enum RawDocument {
    Absent,
    Parsed(Value),
    Corrupt,
}

/// Where a document that did not load cleanly is copied before it can be overwritten.
pub fn corrupt_copy_path(path: &Path) -> PathBuf {
    with_suffix(path, "corrupt")
}

async fn preserve_corrupt(path: &Path) {
    let copy = corrupt_copy_path(path);
    match fs::copy(path, &copy).await {
        Ok(_) => warn!(path = %path.display(), copy = %copy.display(), "Kept a copy of the unreadable document"),
        Err(err) => warn!(path = %path.display(), error = %err, "Could not copy unreadable document"),
    }
}

/// Id sequence of a stored record that may not deserialize as a whole.
fn raw_sequence(element: &Value) -> Option<u32> {
    ["id", "itemId"]
        .iter()
        .filter_map(|key| element.get(*key).and_then(Value::as_str))
        .filter_map(parse_item_sequence)
        .max()
}

/// Overlays the keys of a stored settings document onto `defaults`.
pub fn merge_settings(defaults: &Settings, stored: Value) -> Result<Settings, serde_json::Error> {
    let mut merged = serde_json::to_value(defaults)?;
    match (&mut merged, stored) {
        (Value::Object(base), Value::Object(overrides)) => {
            base.extend(overrides);
        }
        (_, other) => {
            // Not an object: let deserialization report the mismatch.
            return serde_json::from_value(other);
        }
    }
    serde_json::from_value(merged)
}

/// Strips the PNG data-URL header; anything else is taken as bare base64.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, ServiceError> {
    let encoded = data_url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .unwrap_or(data_url);
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| ServiceError::PersistenceError(format!("image data is not base64: {}", e)))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

async fn stage(
    inventory_stage: &Path,
    inventory_json: &str,
    settings_stage: &Path,
    settings_json: &str,
) -> std::io::Result<()> {
    fs::write(inventory_stage, inventory_json).await?;
    fs::write(settings_stage, settings_json).await
}

async fn discard(paths: &[&Path]) {
    for path in paths {
        if let Err(err) = fs::remove_file(path).await {
            if err.kind() != ErrorKind::NotFound {
                debug!(path = %path.display(), error = %err, "Could not remove leftover file");
            }
        }
    }
}

#[async_trait]
impl StorageGateway for JsonFileGateway {
    #[instrument(skip(self, inventory, settings), fields(items = inventory.len()))]
    async fn save(&self, inventory: &[ItemRecord], settings: &Settings) -> SaveOutcome {
        match self.write_documents(inventory, settings).await {
            Ok(()) => {
                debug!(dir = %self.config.data_dir.display(), "Documents saved");
                SaveOutcome::ok()
            }
            Err(err) => {
                warn!(error = %err, "Saving documents failed");
                SaveOutcome::failed(err.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    async fn load(&self) -> StoredState {
        let (inventory, skipped_sequence) = self.load_inventory().await;
        let mut settings = self.load_settings().await;
        settings.last_item_id = settings.last_item_id.max(skipped_sequence);
        info!(
            items = inventory.len(),
            last_item_id = settings.last_item_id,
            "Loaded stored inventory"
        );
        StoredState {
            inventory,
            settings,
        }
    }

    #[instrument(skip(self, png_data_url, picker))]
    async fn save_image(
        &self,
        png_data_url: &str,
        suggested_file_name: &str,
        picker: &dyn DestinationPicker,
    ) -> SaveOutcome {
        let Some(path) = picker.pick_destination(suggested_file_name, IMAGE_FILTERS) else {
            return SaveOutcome::cancelled();
        };

        let bytes = match decode_data_url(png_data_url) {
            Ok(bytes) => bytes,
            Err(err) => return SaveOutcome::failed(err.to_string()),
        };

        match fs::write(&path, bytes).await {
            Ok(()) => {
                info!(path = %path.display(), "Label image saved");
                SaveOutcome::written_to(path)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Saving label image failed");
                SaveOutcome::failed(err.to_string())
            }
        }
    }

    #[instrument(skip(self, snapshot), fields(items = snapshot.inventory.len()))]
    async fn write_export(&self, snapshot: &InventorySnapshot, path: &Path) -> SaveOutcome {
        let json = match serde_json::to_string_pretty(snapshot) {
            Ok(json) => json,
            Err(err) => return SaveOutcome::failed(err.to_string()),
        };
        match fs::write(path, json).await {
            Ok(()) => SaveOutcome::written_to(path),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Writing export failed");
                SaveOutcome::failed(err.to_string())
            }
        }
    }

    async fn read_import(&self, path: &Path) -> Result<String, ServiceError> {
        fs::read_to_string(path)
            .await
            .map_err(|e| ServiceError::ImportError(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_STORE_NAME;
    use crate::persistence::FixedDestination;
    use tempfile::TempDir;

    fn gateway(dir: &TempDir) -> JsonFileGateway {
        JsonFileGateway::new(StorageConfig::in_dir(dir.path().join("data")), Settings::default())
    }

    #[tokio::test]
    async fn missing_directory_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let state = gateway(&dir).load().await;
        assert!(state.inventory.is_empty());
        assert_eq!(state.settings, Settings::default());
    }

    #[tokio::test]
    async fn save_creates_directory_and_leaves_no_staging_files() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let settings = Settings {
            store_name: "X".into(),
            last_item_id: 4,
        };

        let outcome = gateway.save(&[], &settings).await;
        assert!(outcome.success, "{:?}", outcome);

        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("data"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["naqshi-store-data.json", "settings.json"]);

        let raw = std::fs::read_to_string(gateway.config().settings_path()).unwrap();
        assert!(raw.contains("\n  \"storeName\": \"X\""), "not pretty-printed: {}", raw);
        assert_eq!(gateway.load().await.settings, settings);
    }

    #[tokio::test]
    async fn settings_keys_merge_over_configured_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::in_dir(dir.path());
        std::fs::write(config.settings_path(), r#"{"lastItemId": 9}"#).unwrap();

        let gateway = JsonFileGateway::new(config, Settings::with_store_name("Branch Two"));
        let settings = gateway.load().await.settings;
        assert_eq!(settings.store_name, "Branch Two");
        assert_eq!(settings.last_item_id, 9);
    }

    #[tokio::test]
    async fn failed_settings_commit_restores_previous_inventory() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        assert!(gateway.save(&[], &Settings::default()).await.success);
        let before = std::fs::read_to_string(gateway.config().inventory_path()).unwrap();

        // A directory squatting on the settings path makes the final rename fail.
        let settings_path = gateway.config().settings_path();
        std::fs::remove_file(&settings_path).unwrap();
        std::fs::create_dir(&settings_path).unwrap();
        std::fs::write(settings_path.join("blocker"), "x").unwrap();

        let record: ItemRecord = serde_json::from_value(serde_json::json!({
            "id": "NGP0001", "storeName": DEFAULT_STORE_NAME, "itemId": "NGP0001",
            "itemType": "Ring", "weight": "5", "purity": "22K", "totalPrice": "300",
            "dateCreated": "2024-03-01T10:00:00Z", "dateModified": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        let outcome = gateway.save(&[record], &Settings::default()).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("rolled back"));

        let after = std::fs::read_to_string(gateway.config().inventory_path()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn save_image_honours_cancel_and_decodes_payload() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let data_url = format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(b"\x89PNG fake"));

        let cancelled = gateway
            .save_image(&data_url, "NGP0001_QR.png", &FixedDestination(None))
            .await;
        assert!(cancelled.is_cancelled());

        let target = dir.path().join("label.png");
        let outcome = gateway
            .save_image(&data_url, "NGP0001_QR.png", &FixedDestination(Some(target.clone())))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.path.as_deref(), Some(target.as_path()));
        assert_eq!(std::fs::read(&target).unwrap(), b"\x89PNG fake");
    }

    #[tokio::test]
    async fn unreadable_records_are_skipped_and_file_preserved() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let inventory_path = gateway.config().inventory_path();
        std::fs::write(
            &inventory_path,
            serde_json::json!([
                {
                    "id": "NGP0001", "storeName": "X", "itemId": "NGP0001",
                    "itemType": "Ring", "weight": "5", "purity": "22K", "totalPrice": "300",
                    "dateCreated": "2024-03-01T10:00:00Z", "dateModified": "2024-03-01T10:00:00Z"
                },
                { "id": "NGP0007", "itemId": "NGP0007", "weight": "5 g" }
            ])
            .to_string(),
        )
        .unwrap();

        let state = gateway.load().await;
        assert_eq!(state.inventory.len(), 1);
        assert_eq!(state.inventory[0].id, "NGP0001");
        assert_eq!(state.settings.last_item_id, 7);

        let copy = std::fs::read_to_string(corrupt_copy_path(&inventory_path)).unwrap();
        assert!(copy.contains("5 g"));
    }

    #[tokio::test]
    async fn corrupt_settings_are_copied_aside() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::in_dir(dir.path());
        std::fs::write(config.settings_path(), "{ not json").unwrap();

        let gateway = JsonFileGateway::new(config.clone(), Settings::default());
        assert_eq!(gateway.load().await.settings, Settings::default());
        assert_eq!(
            std::fs::read_to_string(corrupt_copy_path(&config.settings_path())).unwrap(),
            "{ not json"
        );
        assert!(!corrupt_copy_path(&config.inventory_path()).exists());
    }

    #[test]
    fn non_object_settings_do_not_merge() {
        assert!(merge_settings(&Settings::default(), serde_json::json!([1, 2])).is_err());
    }
}
