use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ServiceError;

use super::jewelry_item::{ItemRecord, JewelryType, OTHER_ITEM_TYPE};

/// Where a blank form takes a field's initial value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Empty,
    StoreName,
    NextItemId,
}

/// One row of the item field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub default: FieldDefault,
    pub validate: Option<fn(&str) -> Result<(), String>>,
}

/// Fixed schema of the item form, in the order fields are checked.
pub const ITEM_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "storeName",
        required: true,
        default: FieldDefault::StoreName,
        validate: None,
    },
    FieldSpec {
        name: "itemId",
        required: true,
        default: FieldDefault::NextItemId,
        validate: None,
    },
    FieldSpec {
        name: "itemType",
        required: true,
        default: FieldDefault::Empty,
        validate: None,
    },
    FieldSpec {
        name: "weight",
        required: true,
        default: FieldDefault::Empty,
        validate: Some(validate_weight),
    },
    FieldSpec {
        name: "purity",
        required: true,
        default: FieldDefault::Empty,
        validate: None,
    },
    FieldSpec {
        name: "totalPrice",
        required: true,
        default: FieldDefault::Empty,
        validate: Some(validate_price),
    },
    FieldSpec {
        name: "size",
        required: false,
        default: FieldDefault::Empty,
        validate: None,
    },
    FieldSpec {
        name: "color",
        required: false,
        default: FieldDefault::Empty,
        validate: None,
    },
    FieldSpec {
        name: "hallmark",
        required: false,
        default: FieldDefault::Empty,
        validate: None,
    },
    FieldSpec {
        name: "description",
        required: false,
        default: FieldDefault::Empty,
        validate: None,
    },
];

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim()).map_err(|_| format!("'{}' is not a number", raw.trim()))
}

fn validate_weight(raw: &str) -> Result<(), String> {
    let weight = parse_decimal(raw)?;
    if weight <= Decimal::ZERO {
        return Err("must be greater than zero".to_string());
    }
    Ok(())
}

fn validate_price(raw: &str) -> Result<(), String> {
    let price = parse_decimal(raw)?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err("must not be negative".to_string());
    }
    Ok(())
}

/// Raw values of the item form, exactly as the operator typed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemForm {
    pub store_name: String,
    pub item_id: String,
    pub item_type: String,
    /// Free-text type, only read when `item_type` is "Other".
    pub custom_type: String,
    pub weight: String,
    pub purity: String,
    pub total_price: String,
    pub size: String,
    pub color: String,
    pub hallmark: String,
    pub description: String,
}

/// Form values after validation, ready to become an [`ItemRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedItem {
    pub store_name: String,
    pub item_id: String,
    pub item_type: String,
    pub weight: Decimal,
    pub purity: String,
    pub total_price: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
    pub hallmark: Option<String>,
    pub description: Option<String>,
}

impl ItemForm {
    /// A cleared form, with table defaults applied.
    pub fn blank(store_name: &str, next_item_id: &str) -> Self {
        let mut form = ItemForm::default();
        for spec in ITEM_FIELDS {
            match spec.default {
                FieldDefault::StoreName => form.set(spec.name, store_name),
                FieldDefault::NextItemId => form.set(spec.name, next_item_id),
                FieldDefault::Empty => {}
            }
        }
        form
    }

    /// Populates the form for editing. Types outside the standard vocabulary
    /// go through the "Other" path.
    pub fn from_record(record: &ItemRecord) -> Self {
        let (item_type, custom_type) = if record.has_custom_type() {
            (OTHER_ITEM_TYPE.to_string(), record.item_type.clone())
        } else {
            (record.item_type.clone(), String::new())
        };

        Self {
            store_name: record.store_name.clone(),
            item_id: record.item_id.clone(),
            item_type,
            custom_type,
            weight: record.weight.to_string(),
            purity: record.purity.clone(),
            total_price: record.total_price.to_string(),
            size: record.size.clone().unwrap_or_default(),
            color: record.color.clone().unwrap_or_default(),
            hallmark: record.hallmark.clone().unwrap_or_default(),
            description: record.description.clone().unwrap_or_default(),
        }
    }

    pub fn value(&self, field: &str) -> &str {
        match field {
            "storeName" => &self.store_name,
            "itemId" => &self.item_id,
            "itemType" => &self.item_type,
            "customType" => &self.custom_type,
            "weight" => &self.weight,
            "purity" => &self.purity,
            "totalPrice" => &self.total_price,
            "size" => &self.size,
            "color" => &self.color,
            "hallmark" => &self.hallmark,
            "description" => &self.description,
            _ => "",
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        let slot = match field {
            "storeName" => &mut self.store_name,
            "itemId" => &mut self.item_id,
            "itemType" => &mut self.item_type,
            "customType" => &mut self.custom_type,
            "weight" => &mut self.weight,
            "purity" => &mut self.purity,
            "totalPrice" => &mut self.total_price,
            "size" => &mut self.size,
            "color" => &mut self.color,
            "hallmark" => &mut self.hallmark,
            "description" => &mut self.description,
            _ => return,
        };
        *slot = value.into();
    }

    /// Checks the form against [`ITEM_FIELDS`].
    ///
    /// Blank required fields are reported first, in table order; value checks
    /// only run once every required field is present.
    pub fn validate(&self) -> Result<ValidatedItem, ServiceError> {
        if let Some(spec) = ITEM_FIELDS
            .iter()
            .find(|spec| spec.required && self.value(spec.name).trim().is_empty())
        {
            return Err(ServiceError::missing_field(spec.name));
        }

        for spec in ITEM_FIELDS {
            let raw = self.value(spec.name).trim();
            if raw.is_empty() {
                continue;
            }
            if let Some(check) = spec.validate {
                check(raw).map_err(|reason| ServiceError::invalid_field(spec.name, reason))?;
            }
        }

        let mut item_type = self.item_type.trim().to_string();
        if item_type == OTHER_ITEM_TYPE {
            let custom = self.custom_type.trim();
            if custom.is_empty() {
                return Err(ServiceError::missing_field("customType"));
            }
            item_type = custom.to_string();
        }

        let weight = parse_decimal(&self.weight)
            .map_err(|reason| ServiceError::invalid_field("weight", reason))?;
        let total_price = parse_decimal(&self.total_price)
            .map_err(|reason| ServiceError::invalid_field("totalPrice", reason))?;

        Ok(ValidatedItem {
            store_name: self.store_name.trim().to_string(),
            item_id: self.item_id.trim().to_string(),
            item_type,
            weight,
            purity: self.purity.trim().to_string(),
            total_price,
            size: optional(&self.size),
            color: optional(&self.color),
            hallmark: optional(&self.hallmark),
            description: optional(&self.description),
        })
    }
}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// True when `label` may be typed straight into the type field.
pub fn is_selectable_type(label: &str) -> bool {
    label == OTHER_ITEM_TYPE || JewelryType::is_standard(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn ring_form() -> ItemForm {
        ItemForm {
            store_name: "X".into(),
            item_id: "NGP0001".into(),
            item_type: "Ring".into(),
            weight: "5".into(),
            purity: "22K".into(),
            total_price: "300".into(),
            ..Default::default()
        }
    }

    #[test]
    fn blank_form_applies_table_defaults() {
        let form = ItemForm::blank("Naqshi Gold & Pearls", "NGP0004");
        assert_eq!(form.store_name, "Naqshi Gold & Pearls");
        assert_eq!(form.item_id, "NGP0004");
        assert!(form.item_type.is_empty());
    }

    #[test]
    fn reports_first_missing_field_in_table_order() {
        let mut form = ring_form();
        form.weight = "  ".into();
        form.purity = String::new();
        assert_matches!(
            form.validate(),
            Err(ServiceError::ValidationError { field, .. }) if field == "weight"
        );
    }

    #[test]
    fn missing_field_wins_over_bad_value() {
        let mut form = ring_form();
        form.weight = "heavy".into();
        form.total_price = String::new();
        assert_matches!(
            form.validate(),
            Err(ServiceError::ValidationError { field, .. }) if field == "totalPrice"
        );
    }

    #[test]
    fn rejects_non_positive_weight_and_negative_price() {
        let mut form = ring_form();
        form.weight = "0".into();
        assert_matches!(
            form.validate(),
            Err(ServiceError::ValidationError { field, .. }) if field == "weight"
        );

        let mut form = ring_form();
        form.total_price = "-1".into();
        assert_matches!(
            form.validate(),
            Err(ServiceError::ValidationError { field, .. }) if field == "totalPrice"
        );

        let mut form = ring_form();
        form.total_price = "0".into();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn other_type_requires_custom_label() {
        let mut form = ring_form();
        form.item_type = "Other".into();
        assert_matches!(
            form.validate(),
            Err(ServiceError::ValidationError { field, .. }) if field == "customType"
        );

        form.custom_type = " Brooch ".into();
        let item = form.validate().unwrap();
        assert_eq!(item.item_type, "Brooch");
    }

    #[test]
    fn trims_values_and_drops_blank_optionals() {
        let mut form = ring_form();
        form.purity = " 22K ".into();
        form.hallmark = "BIS".into();
        form.description = "   ".into();

        let item = form.validate().unwrap();
        assert_eq!(item.purity, "22K");
        assert_eq!(item.weight, dec!(5));
        assert_eq!(item.hallmark.as_deref(), Some("BIS"));
        assert!(item.description.is_none());
    }

    #[test]
    fn selectable_types_include_other() {
        assert!(is_selectable_type("Other"));
        assert!(is_selectable_type("Nose Pin"));
        assert!(!is_selectable_type("Brooch"));
    }
}
