//! Console error taxonomy.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Field-level validation failures, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Create an empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Flag a field as invalid.
    pub fn insert(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.insert(field.into(), reason.into());
    }

    /// Whether any field is flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a specific field is flagged.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Reason recorded for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Flagged field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, reason) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {reason}")?;
            first = false;
        }
        Ok(())
    }
}

/// Error reported by the management API, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status, when the request reached the controller.
    pub status: Option<u16>,
    /// Controller error code (e.g. `NOT_FOUND`, `COULD_NOT_VALIDATE`).
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Field the controller blamed, if any.
    pub field: Option<String>,
}

impl ApiError {
    /// Error without an HTTP status (connection refused, timeout, decode failure).
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            field: None,
        }
    }

    /// Error carrying an HTTP status.
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
            field: None,
        }
    }

    /// Whether the controller reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404) || self.code.as_deref() == Some("NOT_FOUND")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "{status} {code}: {}", self.message),
            (Some(status), None) => write!(f, "{status}: {}", self.message),
            (None, _) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Console errors.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Local field checks failed; no request was made.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The controller rejected a create or update.
    #[error("Error {action}: {message}")]
    Save {
        /// `Creating` or `Updating` plus the entity label.
        action: String,
        /// Message extracted from the controller response.
        message: String,
    },

    /// Any other management API failure.
    #[error("Management API error: {0}")]
    Api(#[from] ApiError),

    /// Entity does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Resource collection.
        resource: String,
        /// Requested id.
        id: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not allowed in the current form state.
    #[error("Form is {actual}, expected {expected}")]
    InvalidState {
        /// State the operation needs.
        expected: &'static str,
        /// State the form is in.
        actual: &'static str,
    },
}

/// Result type for console operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_display_is_sorted() {
        let mut errors = FieldErrors::new();
        errors.insert("semantic", "required");
        errors.insert("name", "required");
        assert_eq!(errors.to_string(), "name: required, semantic: required");
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "semantic"]);
    }

    #[test]
    fn api_error_display() {
        let err = ApiError {
            status: Some(400),
            code: Some("COULD_NOT_VALIDATE".into()),
            message: "name is required".into(),
            field: Some("name".into()),
        };
        assert_eq!(err.to_string(), "400 COULD_NOT_VALIDATE: name is required");
        assert_eq!(ApiError::transport("connection refused").to_string(), "connection refused");
    }

    #[test]
    fn api_error_not_found() {
        assert!(ApiError::with_status(404, "gone").is_not_found());
        let coded = ApiError {
            status: Some(400),
            code: Some("NOT_FOUND".into()),
            message: String::new(),
            field: None,
        };
        assert!(coded.is_not_found());
        assert!(!ApiError::with_status(500, "boom").is_not_found());
    }

    #[test]
    fn save_error_display() {
        let err = ConsoleError::Save {
            action: "Creating Edge Router Policy".into(),
            message: "duplicate name".into(),
        };
        assert_eq!(err.to_string(), "Error Creating Edge Router Policy: duplicate name");
    }
}
