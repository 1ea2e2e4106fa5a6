use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Prefix of every issued item identifier.
pub const ITEM_ID_PREFIX: &str = "NGP";

/// Type label that switches the form into free-text mode.
pub const OTHER_ITEM_TYPE: &str = "Other";

/// Standard jewelry vocabulary offered by the item form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum JewelryType {
    Ring,
    Necklace,
    Bracelet,
    Earrings,
    Chain,
    Pendant,
    Bangle,
    Anklet,
    #[strum(serialize = "Nose Pin")]
    NosePin,
    #[strum(serialize = "Toe Ring")]
    ToeRing,
    Pearls,
    Set,
}

impl JewelryType {
    /// True when `label` is one of the fixed vocabulary entries (not "Other").
    pub fn is_standard(label: &str) -> bool {
        label.parse::<JewelryType>().is_ok()
    }

    pub fn labels() -> Vec<&'static str> {
        JewelryType::iter().map(<&'static str>::from).collect()
    }
}

/// One physical jewelry piece as stored in the inventory document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: String,
    pub store_name: String,
    pub item_id: String,
    pub item_type: String,
    /// Grams
    pub weight: Decimal,
    pub purity: String,
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallmark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl ItemRecord {
    /// Numeric suffix of the item id, if it follows the `NGP####` scheme.
    pub fn sequence(&self) -> Option<u32> {
        parse_item_sequence(&self.item_id)
    }

    /// True when the type is a free-text value entered through "Other".
    pub fn has_custom_type(&self) -> bool {
        !JewelryType::is_standard(&self.item_type)
    }
}

/// Formats a sequence number as an item id: `7` -> `NGP0007`.
pub fn format_item_id(sequence: u32) -> String {
    format!("{}{:04}", ITEM_ID_PREFIX, sequence)
}

/// Inverse of [`format_item_id`]; ids that do not follow the scheme yield `None`.
pub fn parse_item_sequence(item_id: &str) -> Option<u32> {
    let digits = item_id.strip_prefix(ITEM_ID_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_are_zero_padded() {
        assert_eq!(format_item_id(1), "NGP0001");
        assert_eq!(format_item_id(42), "NGP0042");
        assert_eq!(format_item_id(12345), "NGP12345");
    }

    #[test]
    fn sequence_parsing_rejects_foreign_ids() {
        assert_eq!(parse_item_sequence("NGP0007"), Some(7));
        assert_eq!(parse_item_sequence("NGP"), None);
        assert_eq!(parse_item_sequence("ABC0007"), None);
        assert_eq!(parse_item_sequence("NGP00x7"), None);
    }

    #[test]
    fn vocabulary_uses_display_labels() {
        assert!(JewelryType::is_standard("Nose Pin"));
        assert!(JewelryType::is_standard("Ring"));
        assert!(!JewelryType::is_standard("Brooch"));
        assert!(!JewelryType::is_standard(OTHER_ITEM_TYPE));
        assert_eq!(JewelryType::labels().len(), 12);
        assert_eq!(JewelryType::ToeRing.to_string(), "Toe Ring");
    }

    #[test]
    fn records_accept_legacy_string_numbers() {
        let json = r#"{
            "id": "NGP0003",
            "storeName": "Naqshi Gold & Pearls",
            "itemId": "NGP0003",
            "itemType": "Bangle",
            "weight": "12.5",
            "purity": "22K",
            "totalPrice": 950,
            "dateCreated": "2024-03-01T10:00:00.000Z",
            "dateModified": "2024-03-01T10:00:00.000Z"
        }"#;

        let record: ItemRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.weight, Decimal::new(125, 1));
        assert_eq!(record.total_price, Decimal::from(950));
        assert_eq!(record.sequence(), Some(3));
        assert!(record.description.is_none());
    }
}
