use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::ItemRecord;

/// Occurrences of one label (type or purity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMetrics {
    pub total_items: usize,
    pub total_value: Decimal,
    pub distinct_types: usize,
    /// In order of first appearance
    pub by_type: Vec<LabelCount>,
    /// In order of first appearance
    pub by_purity: Vec<LabelCount>,
}

/// Values offered by the type and purity filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFacets {
    pub item_types: Vec<String>,
    pub purities: Vec<String>,
}

fn bump(counts: &mut Vec<LabelCount>, label: &str) {
    match counts.iter_mut().find(|entry| entry.label == label) {
        Some(entry) => entry.count += 1,
        None => counts.push(LabelCount {
            label: label.to_string(),
            count: 1,
        }),
    }
}

pub fn inventory_metrics(records: &[ItemRecord]) -> InventoryMetrics {
    let mut by_type = Vec::new();
    let mut by_purity = Vec::new();
    let mut total_value = Decimal::ZERO;

    for record in records {
        bump(&mut by_type, &record.item_type);
        bump(&mut by_purity, &record.purity);
        total_value += record.total_price;
    }

    InventoryMetrics {
        total_items: records.len(),
        total_value,
        distinct_types: by_type.len(),
        by_type,
        by_purity,
    }
}

/// Sorted, de-duplicated, non-blank types and purities.
pub fn filter_facets(records: &[ItemRecord]) -> FilterFacets {
    let collect = |pick: fn(&ItemRecord) -> &str| -> Vec<String> {
        records
            .iter()
            .map(pick)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    FilterFacets {
        item_types: collect(|record| record.item_type.as_str()),
        purities: collect(|record| record.purity.as_str()),
    }
}
