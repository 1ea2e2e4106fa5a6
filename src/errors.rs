use serde::{Deserialize, Serialize};

/// Serializable error notification handed to the front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    /// Error category (e.g., "Validation", "Not Found", "Persistence")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Form field the error refers to, for inline display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {field} {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Import error: {0}")]
    ImportError(String),

    #[error("QR error: {0}")]
    QrError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ServiceError {
    /// A required field was absent or blank.
    pub fn missing_field(field: impl Into<String>) -> Self {
        ServiceError::ValidationError {
            field: field.into(),
            reason: "is required".to_string(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending form field, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::ValidationError { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Errors the operator can fix by editing input, shown inline rather than
    /// as a transient notification.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::ValidationError { .. } | Self::Conflict(_) | Self::NotFound(_)
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::ValidationError { .. } => "Validation",
            Self::NotFound(_) => "Not Found",
            Self::Conflict(_) => "Conflict",
            Self::PersistenceError(_) | Self::Io(_) => "Persistence",
            Self::ImportError(_) => "Import",
            Self::QrError(_) => "QR",
            Self::SerializationError(_) => "Serialization",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            error: self.category().to_string(),
            message: self.to_string(),
            field: self.field().map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<qrcode::types::QrError> for ServiceError {
    fn from(err: qrcode::types::QrError) -> Self {
        ServiceError::QrError(err.to_string())
    }
}

impl From<image::ImageError> for ServiceError {
    fn from(err: image::ImageError) -> Self {
        ServiceError::QrError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_field() {
        let err = ServiceError::missing_field("weight");
        assert_eq!(err.field(), Some("weight"));
        assert_eq!(err.to_string(), "Validation error: weight is required");
        assert!(err.is_user_facing());
    }

    #[test]
    fn persistence_errors_are_notifications() {
        let err = ServiceError::PersistenceError("disk full".into());
        assert!(!err.is_user_facing());

        let report = err.report();
        assert_eq!(report.error, "Persistence");
        assert!(report.field.is_none());
        assert!(report.message.contains("disk full"));
    }
}
