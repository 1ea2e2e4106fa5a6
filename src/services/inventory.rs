use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    errors::ServiceError,
    events::{EventSender, StoreEvent},
    models::{
        format_item_id, parse_item_sequence, ImportDocument, InventorySnapshot, ItemForm,
        ItemRecord, Settings,
    },
    persistence::{DestinationPicker, SaveOutcome, StorageGateway},
    qr::{LabelRenderer, QrPayload},
    services::analytics::{filter_facets, inventory_metrics, FilterFacets, InventoryMetrics},
};

/// Rows per inventory page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Criteria for the inventory list. Blank criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryFilter {
    /// Exact item type
    pub item_type: Option<String>,
    /// Exact purity label
    pub purity: Option<String>,
    /// Case-insensitive substring of id, type, description or hallmark
    pub search: Option<String>,
}

fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl InventoryFilter {
    pub fn is_empty(&self) -> bool {
        criterion(&self.item_type).is_none()
            && criterion(&self.purity).is_none()
            && criterion(&self.search).is_none()
    }

    pub fn matches(&self, record: &ItemRecord) -> bool {
        if let Some(item_type) = criterion(&self.item_type) {
            if record.item_type != item_type {
                return false;
            }
        }
        if let Some(purity) = criterion(&self.purity) {
            if record.purity != purity {
                return false;
            }
        }
        match criterion(&self.search) {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                [
                    Some(record.item_id.as_str()),
                    Some(record.item_type.as_str()),
                    record.description.as_deref(),
                    record.hallmark.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            }
        }
    }
}

/// Records matching `filter`, in source order.
pub fn filter_records(records: &[ItemRecord], filter: &InventoryFilter) -> Vec<ItemRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number after clamping
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Slices `records` into the requested page, clamping `page` into
/// `1..=total_pages` (at least 1, so an empty list yields an empty first page).
pub fn paginate<T: Clone>(records: &[T], page: usize, page_size: usize) -> Page<T> {
    let per_page = page_size.max(1);
    let total = records.len();
    let total_pages = (total + per_page - 1) / per_page;
    let page = page.clamp(1, total_pages.max(1));
    let start = ((page - 1) * per_page).min(total);
    let end = (start + per_page).min(total);

    Page {
        items: records[start..end].to_vec(),
        page,
        per_page,
        total,
        total_pages,
    }
}

/// A mutation that has been applied in memory, with the result of persisting it.
#[derive(Debug, Clone, Serialize)]
pub struct Committed<T> {
    pub value: T,
    pub saved: SaveOutcome,
}

impl<T> Committed<T> {
    pub fn is_saved(&self) -> bool {
        self.saved.success
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// What an import replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Records now in the store when the inventory was replaced
    pub items: Option<usize>,
    pub settings_replaced: bool,
}

/// Authoritative in-memory inventory and settings.
///
/// The store is owned by the front end and mutated through `&mut self`. Every
/// mutation is written through the gateway before returning; when the write
/// fails the in-memory state is kept and the failure is returned alongside the
/// value so it can be retried with [`InventoryStore::save`].
///
/// Item ids are issued from `settings.last_item_id`. A previewed id lives only
/// in memory until a create commits it, so previews never advance the counter
/// on disk.
pub struct InventoryStore {
    gateway: Arc<dyn StorageGateway>,
    events: Option<EventSender>,
    inventory: Vec<ItemRecord>,
    settings: Settings,
    pending_sequence: Option<u32>,
    page_size: usize,
}

impl InventoryStore {
    /// Loads the stored documents and previews the first item id.
    #[instrument(skip_all)]
    pub async fn open(gateway: Arc<dyn StorageGateway>, events: Option<EventSender>) -> Self {
        let stored = gateway.load().await;
        let mut store = Self {
            gateway,
            events,
            inventory: stored.inventory,
            settings: stored.settings,
            pending_sequence: None,
            page_size: DEFAULT_PAGE_SIZE,
        };
        store.reconcile_sequence();
        store.next_item_id();
        store
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn items(&self) -> &[ItemRecord] {
        &self.inventory
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.inventory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inventory.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn get(&self, id: &str) -> Option<&ItemRecord> {
        self.inventory.iter().find(|record| record.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.inventory.iter().position(|record| record.id == id)
    }

    /// Keeps the counter at or above every issued id, so a lost or stale
    /// settings document cannot cause an id to be issued twice.
    fn reconcile_sequence(&mut self) {
        let highest = self
            .inventory
            .iter()
            .filter_map(ItemRecord::sequence)
            .max()
            .unwrap_or(0);
        if highest > self.settings.last_item_id {
            warn!(
                last_item_id = self.settings.last_item_id,
                highest_issued = highest,
                "Sequence counter behind inventory; advancing"
            );
            self.settings.last_item_id = highest;
        }
    }

    /// Issues the next item id for the form. Each call advances the in-memory
    /// preview by one; nothing is persisted until a create commits it.
    pub fn next_item_id(&mut self) -> String {
        let sequence = self
            .pending_sequence
            .unwrap_or(self.settings.last_item_id)
            .saturating_add(1);
        self.pending_sequence = Some(sequence);
        let item_id = format_item_id(sequence);
        debug!(item_id = %item_id, "Previewing next item id");
        item_id
    }

    /// The id currently shown on the form, if one has been issued.
    pub fn pending_item_id(&self) -> Option<String> {
        self.pending_sequence.map(format_item_id)
    }

    /// The id the next issuance would return, without issuing it.
    pub fn peek_next_item_id(&self) -> String {
        self.pending_item_id()
            .unwrap_or_else(|| self.settings.peek_next_item_id())
    }

    /// A cleared item form. Reuses the outstanding preview id when there is one.
    pub fn blank_form(&mut self) -> ItemForm {
        let item_id = match self.pending_item_id() {
            Some(item_id) => item_id,
            None => self.next_item_id(),
        };
        ItemForm::blank(&self.settings.store_name, &item_id)
    }

    /// Validates `form` and appends a new record.
    #[instrument(skip(self, form), fields(item_id = %form.item_id))]
    pub async fn create(&mut self, form: &ItemForm) -> Result<Committed<ItemRecord>, ServiceError> {
        let item = form.validate()?;
        if self.get(&item.item_id).is_some() {
            return Err(ServiceError::Conflict(format!(
                "item {} already exists",
                item.item_id
            )));
        }

        let now = Utc::now();
        let record = ItemRecord {
            id: item.item_id.clone(),
            store_name: item.store_name,
            item_id: item.item_id,
            item_type: item.item_type,
            weight: item.weight,
            purity: item.purity,
            total_price: item.total_price,
            size: item.size,
            color: item.color,
            hallmark: item.hallmark,
            description: item.description,
            date_created: now,
            date_modified: now,
        };

        let issued = [self.pending_sequence.take(), record.sequence()]
            .into_iter()
            .flatten()
            .max();
        if let Some(sequence) = issued {
            self.settings.last_item_id = self.settings.last_item_id.max(sequence);
        }
        self.inventory.push(record.clone());

        let saved = self.persist().await;
        info!(item_id = %record.id, item_type = %record.item_type, saved = saved.success, "Item created");
        self.emit(StoreEvent::ItemCreated {
            item_id: record.id.clone(),
        })
        .await;
        self.next_item_id();

        Ok(Committed {
            value: record,
            saved,
        })
    }

    /// Replaces the record `id` with the form's values, keeping its creation date.
    #[instrument(skip(self, form))]
    pub async fn update(
        &mut self,
        id: &str,
        form: &ItemForm,
    ) -> Result<Committed<ItemRecord>, ServiceError> {
        let index = self
            .position(id)
            .ok_or_else(|| ServiceError::NotFound(format!("item {}", id)))?;
        let item = form.validate()?;
        if item.item_id != id {
            return Err(ServiceError::invalid_field(
                "itemId",
                format!("cannot change from {} to {}", id, item.item_id),
            ));
        }

        let previous = &self.inventory[index];
        let record = ItemRecord {
            id: previous.id.clone(),
            store_name: item.store_name,
            item_id: previous.item_id.clone(),
            item_type: item.item_type,
            weight: item.weight,
            purity: item.purity,
            total_price: item.total_price,
            size: item.size,
            color: item.color,
            hallmark: item.hallmark,
            description: item.description,
            date_created: previous.date_created,
            date_modified: Utc::now().max(previous.date_modified),
        };
        self.inventory[index] = record.clone();

        let saved = self.persist().await;
        info!(item_id = %record.id, saved = saved.success, "Item updated");
        self.emit(StoreEvent::ItemUpdated {
            item_id: record.id.clone(),
        })
        .await;

        Ok(Committed {
            value: record,
            saved,
        })
    }

    /// Removes the record `id`. Confirmation is the caller's job; an unknown id
    /// is a no-op and returns `None`.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: &str) -> Option<Committed<ItemRecord>> {
        let Some(index) = self.position(id) else {
            debug!("Delete of unknown item ignored");
            return None;
        };
        let removed = self.inventory.remove(index);

        let saved = self.persist().await;
        info!(item_id = %removed.id, saved = saved.success, "Item deleted");
        self.emit(StoreEvent::ItemDeleted {
            item_id: removed.id.clone(),
        })
        .await;

        Some(Committed {
            value: removed,
            saved,
        })
    }

    /// Changes the store name used on new items.
    #[instrument(skip(self))]
    pub async fn rename_store(&mut self, store_name: &str) -> Result<Committed<Settings>, ServiceError> {
        let store_name = store_name.trim();
        if store_name.is_empty() {
            return Err(ServiceError::missing_field("storeName"));
        }
        self.settings.store_name = store_name.to_string();
        let saved = self.persist().await;
        Ok(Committed {
            value: self.settings.clone(),
            saved,
        })
    }

    /// Writes the current state again, e.g. after a reported save failure.
    pub async fn save(&self) -> SaveOutcome {
        self.persist().await
    }

    pub fn filter(&self, filter: &InventoryFilter) -> Vec<ItemRecord> {
        filter_records(&self.inventory, filter)
    }

    /// A page of the filtered list using the store's page size.
    pub fn page(&self, filter: &InventoryFilter, page: usize) -> Page<ItemRecord> {
        paginate(&self.filter(filter), page, self.page_size)
    }

    pub fn metrics(&self) -> InventoryMetrics {
        inventory_metrics(&self.inventory)
    }

    pub fn facets(&self) -> FilterFacets {
        filter_facets(&self.inventory)
    }

    pub fn export_snapshot(&self) -> InventorySnapshot {
        InventorySnapshot::new(self.inventory.clone(), self.settings.clone())
    }

    /// Writes an export snapshot to `path`.
    #[instrument(skip(self))]
    pub async fn export_to(&self, path: &Path) -> SaveOutcome {
        let snapshot = self.export_snapshot();
        let outcome = self.gateway.write_export(&snapshot, path).await;
        if outcome.success {
            info!(items = snapshot.inventory.len(), "Inventory exported");
        }
        outcome
    }

    /// Applies an import document. Each half present in the document replaces
    /// the matching half of the store; the result is always persisted. Invalid
    /// documents leave the store untouched.
    #[instrument(skip(self, document))]
    pub async fn import_snapshot(
        &mut self,
        document: ImportDocument,
    ) -> Result<Committed<ImportSummary>, ServiceError> {
        if let Some(inventory) = &document.inventory {
            check_imported_records(inventory)?;
        }

        let summary = ImportSummary {
            items: document.inventory.as_ref().map(Vec::len),
            settings_replaced: document.settings.is_some(),
        };
        if let Some(inventory) = document.inventory {
            self.inventory = inventory;
        }
        if let Some(settings) = document.settings {
            self.settings = settings;
        }
        self.reconcile_sequence();
        self.pending_sequence = None;
        self.next_item_id();

        let saved = self.persist().await;
        info!(
            items = self.inventory.len(),
            settings_replaced = summary.settings_replaced,
            saved = saved.success,
            "Inventory imported"
        );
        self.emit(StoreEvent::InventoryImported {
            items: self.inventory.len(),
            settings_replaced: summary.settings_replaced,
        })
        .await;

        Ok(Committed {
            value: summary,
            saved,
        })
    }

    /// Reads and applies an import file.
    pub async fn import_from(
        &mut self,
        path: &Path,
    ) -> Result<Committed<ImportSummary>, ServiceError> {
        let document = match self.gateway.read_import(path).await {
            Ok(raw) => ImportDocument::from_json(&raw),
            Err(err) => Err(err),
        };

        match document {
            Ok(document) => self.import_snapshot(document).await,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Import failed");
                Err(err)
            }
        }
    }

    /// Label payload for the record `id`.
    pub fn label_payload(&self, id: &str) -> Result<QrPayload, ServiceError> {
        self.get(id)
            .map(QrPayload::from_record)
            .ok_or_else(|| ServiceError::NotFound(format!("item {}", id)))
    }

    /// Renders the label for `id` and saves it where `picker` says.
    #[instrument(skip(self, renderer, picker))]
    pub async fn save_label(
        &self,
        id: &str,
        renderer: &LabelRenderer,
        picker: &dyn DestinationPicker,
    ) -> Result<SaveOutcome, ServiceError> {
        let label = renderer.render(&self.label_payload(id)?)?;
        Ok(self
            .gateway
            .save_image(&label.data_url(), &label.file_name(), picker)
            .await)
    }

    async fn persist(&self) -> SaveOutcome {
        let outcome = self.gateway.save(&self.inventory, &self.settings).await;
        if let Some(message) = outcome.error.as_ref().filter(|_| !outcome.success) {
            warn!(error = %message, "Changes kept in memory but not saved");
            self.emit(StoreEvent::SaveFailed {
                message: message.clone(),
            })
            .await;
        }
        outcome
    }

    async fn emit(&self, event: StoreEvent) {
        if let Some(events) = &self.events {
            if let Err(err) = events.send(event).await {
                debug!(error = %err, "Store event dropped");
            }
        }
    }
}

/// Imported records must satisfy the same invariants as created ones.
fn check_imported_records(records: &[ItemRecord]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for record in records {
        let blank = [
            ("id", record.id.as_str()),
            ("storeName", record.store_name.as_str()),
            ("itemId", record.item_id.as_str()),
            ("itemType", record.item_type.as_str()),
            ("purity", record.purity.as_str()),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((field, _)) = blank {
            return Err(ServiceError::ImportError(format!(
                "record {:?} has a blank {}",
                record.id, field
            )));
        }
        if record.id != record.item_id {
            return Err(ServiceError::ImportError(format!(
                "record {} has mismatched itemId {}",
                record.id, record.item_id
            )));
        }
        if !seen.insert(record.id.as_str()) {
            return Err(ServiceError::ImportError(format!(
                "duplicate item id {}",
                record.id
            )));
        }
    }
    Ok(())
}

/// True when `item_id` follows the issued id scheme.
pub fn is_issued_id(item_id: &str) -> bool {
    parse_item_sequence(item_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryGateway;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(id: &str, item_type: &str) -> ItemRecord {
        let now = Utc::now();
        ItemRecord {
            id: id.into(),
            store_name: "X".into(),
            item_id: id.into(),
            item_type: item_type.into(),
            weight: dec!(2),
            purity: "22K".into(),
            total_price: dec!(100),
            size: None,
            color: None,
            hallmark: None,
            description: None,
            date_created: now,
            date_modified: now,
        }
    }

    #[test]
    fn filter_by_type_keeps_source_order() {
        let records = vec![
            record("NGP0001", "Ring"),
            record("NGP0002", "Necklace"),
            record("NGP0003", "Ring"),
            record("NGP0004", "Necklace"),
            record("NGP0005", "Ring"),
        ];
        let filter = InventoryFilter {
            item_type: Some("Ring".into()),
            ..Default::default()
        };

        let ids: Vec<_> = filter_records(&records, &filter)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["NGP0001", "NGP0003", "NGP0005"]);
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn search_is_case_insensitive_over_optional_fields() {
        let mut with_hallmark = record("NGP0001", "Ring");
        with_hallmark.hallmark = Some("BIS 916".into());
        let mut with_description = record("NGP0002", "Chain");
        with_description.description = Some("Antique Kundan work".into());
        let records = vec![with_hallmark, with_description, record("NGP0003", "Set")];

        let search = |term: &str| {
            filter_records(
                &records,
                &InventoryFilter {
                    search: Some(term.into()),
                    ..Default::default()
                },
            )
            .len()
        };
        assert_eq!(search("bis"), 1);
        assert_eq!(search("KUNDAN"), 1);
        assert_eq!(search("ngp000"), 3);
        assert_eq!(search("set"), 1);
        assert_eq!(search("   "), 3);
    }

    #[test]
    fn blank_criteria_match_everything() {
        let filter = InventoryFilter {
            item_type: Some(String::new()),
            purity: Some("  ".into()),
            search: None,
        };
        assert!(filter.is_empty());
        assert!(filter.matches(&record("NGP0001", "Ring")));
    }

    #[test]
    fn paginate_clamps_page_number() {
        let records: Vec<usize> = (0..25).collect();

        let third = paginate(&records, 3, 10);
        assert_eq!(third.items, (20..25).collect::<Vec<_>>());
        assert_eq!(third.total_pages, 3);

        assert_eq!(paginate(&records, 0, 10).page, 1);
        assert_eq!(paginate(&records, 9, 10).page, 3);

        let empty = paginate::<usize>(&[], 1, 10);
        assert!(empty.items.is_empty());
        assert_eq!(empty.page, 1);
        assert_eq!(empty.total_pages, 0);
    }

    #[tokio::test]
    async fn blank_form_reuses_outstanding_preview() {
        let gateway = Arc::new(MemoryGateway::new());
        let mut store = InventoryStore::open(gateway, None).await;
        assert_eq!(store.pending_item_id().as_deref(), Some("NGP0001"));

        let form = store.blank_form();
        assert_eq!(form.item_id, "NGP0001");
        assert_eq!(form.store_name, crate::models::DEFAULT_STORE_NAME);
        assert_eq!(store.blank_form().item_id, "NGP0001");
    }

    #[tokio::test]
    async fn open_advances_stale_counter() {
        let gateway = Arc::new(MemoryGateway::with_state(
            vec![record("NGP0007", "Ring")],
            Settings::default(),
        ));
        let store = InventoryStore::open(gateway, None).await;
        assert_eq!(store.settings().last_item_id, 7);
        assert_eq!(store.pending_item_id().as_deref(), Some("NGP0008"));
    }

    #[test]
    fn imported_records_must_be_unique_and_complete() {
        let dupes = vec![record("NGP0001", "Ring"), record("NGP0001", "Chain")];
        assert!(matches!(
            check_imported_records(&dupes),
            Err(ServiceError::ImportError(msg)) if msg.contains("duplicate")
        ));

        let mut blank = record("NGP0002", "Ring");
        blank.purity = " ".into();
        assert!(check_imported_records(&[blank]).is_err());

        let mut mismatched = record("NGP0003", "Ring");
        mismatched.item_id = "NGP0004".into();
        assert!(check_imported_records(&[mismatched]).is_err());

        assert!(is_issued_id("NGP0003"));
        assert!(!is_issued_id("CUSTOM-1"));
    }
}
