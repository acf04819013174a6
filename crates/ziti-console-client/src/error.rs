//! Client error types.

use thiserror::Error;
use ziti_console_core::error::ApiError;

/// Errors raised while talking to the management API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The controller returned an error status
    #[error("Management API error {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        field: Option<String>,
    },

    /// Response body did not have the `{ data, meta }` shape
    #[error("Unexpected response envelope: {0}")]
    Envelope(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the controller reported an authentication failure.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    /// Convert to the transport-neutral API error.
    #[must_use]
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::Http(e) => ApiError {
                status: e.status().map(|s| s.as_u16()),
                code: None,
                message: e.to_string(),
                field: None,
            },
            Self::Json(e) => ApiError::transport(format!("JSON error: {e}")),
            Self::Api {
                status,
                code,
                message,
                field,
            } => ApiError {
                status: Some(*status),
                code: code.clone(),
                message: message.clone(),
                field: field.clone(),
            },
            Self::Envelope(message) => ApiError::transport(format!("Unexpected response: {message}")),
            Self::Config(message) => ApiError::transport(format!("Configuration error: {message}")),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        err.to_api_error()
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
