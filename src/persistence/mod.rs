//! Persistence gateway: the only part of the crate that touches the filesystem.
//!
//! The inventory store hands whole documents to a [`StorageGateway`] and never
//! reads files itself. Gateways report failures as [`SaveOutcome`] values rather
//! than errors so a failed write never unwinds through the store.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::errors::ServiceError;
use crate::models::{InventorySnapshot, ItemRecord, Settings};

pub mod json_files;
pub mod memory;

pub use json_files::{corrupt_copy_path, JsonFileGateway, StorageConfig};
pub use memory::MemoryGateway;

/// Result of a write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where the document or image ended up, when the caller chose a path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl SaveOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            path: None,
        }
    }

    pub fn written_to(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::ok()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            path: None,
        }
    }

    /// The operator dismissed the destination prompt.
    pub fn cancelled() -> Self {
        Self {
            success: false,
            error: None,
            path: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.success && self.error.is_none()
    }

    /// Converts a failed outcome into a [`ServiceError::PersistenceError`].
    pub fn into_result(self) -> Result<Option<PathBuf>, ServiceError> {
        match (self.success, self.error) {
            (true, _) => Ok(self.path),
            (false, Some(message)) => Err(ServiceError::PersistenceError(message)),
            (false, None) => Ok(None),
        }
    }
}

/// Everything `load` found on disk, already degraded to defaults where needed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredState {
    pub inventory: Vec<ItemRecord>,
    pub settings: Settings,
}

/// File-type filter offered by a destination prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

pub const IMAGE_FILTERS: &[FileFilter] = &[
    FileFilter {
        name: "PNG",
        extensions: &["png"],
    },
    FileFilter {
        name: "PDF",
        extensions: &["pdf"],
    },
];

pub const JSON_FILTERS: &[FileFilter] = &[FileFilter {
    name: "JSON",
    extensions: &["json"],
}];

/// Asks the operator where to write a file. `None` means the prompt was cancelled.
pub trait DestinationPicker: Send + Sync {
    fn pick_destination(&self, suggested_file_name: &str, filters: &[FileFilter])
        -> Option<PathBuf>;
}

/// Picker that always answers with a path decided up front.
#[derive(Debug, Clone)]
pub struct FixedDestination(pub Option<PathBuf>);

impl DestinationPicker for FixedDestination {
    fn pick_destination(&self, _suggested: &str, _filters: &[FileFilter]) -> Option<PathBuf> {
        self.0.clone()
    }
}

/// True when `path` carries one of the filter extensions (case-insensitive).
pub fn matches_filters(path: &Path, filters: &[FileFilter]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    filters
        .iter()
        .flat_map(|filter| filter.extensions.iter())
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Writes the inventory and settings documents.
    async fn save(&self, inventory: &[ItemRecord], settings: &Settings) -> SaveOutcome;

    /// Reads both documents, falling back to defaults per document.
    async fn load(&self) -> StoredState;

    /// Writes a rendered label (`data:image/png;base64,...`) to a path chosen by `picker`.
    async fn save_image(
        &self,
        png_data_url: &str,
        suggested_file_name: &str,
        picker: &dyn DestinationPicker,
    ) -> SaveOutcome;

    /// Writes an export snapshot as pretty-printed JSON.
    async fn write_export(&self, snapshot: &InventorySnapshot, path: &Path) -> SaveOutcome;

    /// Reads the raw text of an import file.
    async fn read_import(&self, path: &Path) -> Result<String, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_not_an_error() {
        let outcome = SaveOutcome::cancelled();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.into_result().unwrap(), None);
    }

    #[test]
    fn failure_maps_to_persistence_error() {
        let result = SaveOutcome::failed("read-only filesystem").into_result();
        assert!(matches!(result, Err(ServiceError::PersistenceError(msg)) if msg.contains("read-only")));
    }

    #[test]
    fn filters_compare_extensions_case_insensitively() {
        assert!(matches_filters(Path::new("label.PNG"), IMAGE_FILTERS));
        assert!(matches_filters(Path::new("label.pdf"), IMAGE_FILTERS));
        assert!(!matches_filters(Path::new("label.jpg"), IMAGE_FILTERS));
        assert!(!matches_filters(Path::new("backup"), JSON_FILTERS));
    }
}
