use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ServiceError;

use super::{jewelry_item::ItemRecord, store_settings::Settings};

/// Format version written into every export.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Full backup of the store, as written by "Export Data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub inventory: Vec<ItemRecord>,
    pub settings: Settings,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

impl InventorySnapshot {
    pub fn new(inventory: Vec<ItemRecord>, settings: Settings) -> Self {
        Self {
            inventory,
            settings,
            export_date: Utc::now(),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    /// Suggested download name, e.g. `naqshi-gold-backup-2024-03-01.json`.
    pub fn file_name(&self) -> String {
        backup_file_name(self.export_date.date_naive())
    }
}

pub fn backup_file_name(date: NaiveDate) -> String {
    format!("naqshi-gold-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Import document: each half is optional and applied independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportDocument {
    pub inventory: Option<Vec<ItemRecord>>,
    pub settings: Option<Settings>,
}

impl ImportDocument {
    /// Reads an import file's JSON. An `inventory` key that is not an array is
    /// ignored; records or settings that do not parse reject the whole document.
    pub fn from_value(value: Value) -> Result<Self, ServiceError> {
        let Value::Object(mut fields) = value else {
            return Err(ServiceError::ImportError(
                "import document must be a JSON object".to_string(),
            ));
        };

        let inventory = match fields.remove("inventory") {
            Some(items @ Value::Array(_)) => Some(
                serde_json::from_value(items)
                    .map_err(|e| ServiceError::ImportError(format!("inventory: {}", e)))?,
            ),
            _ => None,
        };

        let settings = match fields.remove("settings") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value(raw)
                    .map_err(|e| ServiceError::ImportError(format!("settings: {}", e)))?,
            ),
        };

        Ok(Self {
            inventory,
            settings,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, ServiceError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ServiceError::ImportError(format!("unreadable JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn is_empty(&self) -> bool {
        self.inventory.is_none() && self.settings.is_none()
    }
}

impl From<InventorySnapshot> for ImportDocument {
    fn from(snapshot: InventorySnapshot) -> Self {
        Self {
            inventory: Some(snapshot.inventory),
            settings: Some(snapshot.settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_name_uses_export_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(backup_file_name(date), "naqshi-gold-backup-2024-03-01.json");
    }

    #[test]
    fn snapshot_serializes_expected_shape() {
        let snapshot = InventorySnapshot::new(Vec::new(), Settings::default());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert!(json["inventory"].as_array().unwrap().is_empty());
        assert!(json["exportDate"].is_string());
        assert_eq!(json["settings"]["lastItemId"], 0);
    }

    #[test]
    fn import_accepts_partial_documents() {
        let doc = ImportDocument::from_json(r#"{"settings": {"storeName": "Y"}}"#).unwrap();
        assert!(doc.inventory.is_none());
        assert_eq!(doc.settings.unwrap().store_name, "Y");

        let doc = ImportDocument::from_json(r#"{"inventory": "oops"}"#).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(matches!(
            ImportDocument::from_json("not json"),
            Err(ServiceError::ImportError(_))
        ));
        assert!(matches!(
            ImportDocument::from_json("[1, 2]"),
            Err(ServiceError::ImportError(_))
        ));
        assert!(matches!(
            ImportDocument::from_json(r#"{"inventory": [{"id": 3}]}"#),
            Err(ServiceError::ImportError(_))
        ));
    }
}
