use serde::{Deserialize, Serialize};

use super::jewelry_item::format_item_id;

/// Brand used when no settings document exists yet.
pub const DEFAULT_STORE_NAME: &str = "Naqshi Gold & Pearls";

/// Store-wide configuration persisted next to the inventory document.
///
/// Missing keys fall back to their defaults, so a partial settings file merges
/// over the defaults instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub store_name: String,
    /// Sequence number of the last issued item id.
    pub last_item_id: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            last_item_id: 0,
        }
    }
}

impl Settings {
    pub fn with_store_name(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            ..Default::default()
        }
    }

    /// The id the next issuance would produce, without consuming it.
    pub fn peek_next_item_id(&self) -> String {
        format_item_id(self.last_item_id.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_merge_over_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"lastItemId": 12}"#).unwrap();
        assert_eq!(settings.store_name, DEFAULT_STORE_NAME);
        assert_eq!(settings.last_item_id, 12);
        assert_eq!(settings.peek_next_item_id(), "NGP0013");
    }

    #[test]
    fn serializes_camel_case_keys() {
        let json = serde_json::to_value(Settings::with_store_name("X")).unwrap();
        assert_eq!(json["storeName"], "X");
        assert_eq!(json["lastItemId"], 0);
    }
}
