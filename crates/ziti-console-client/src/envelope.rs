//! Normalization of `{ data, meta }` response envelopes.
//!
//! Everything the core receives passes through here, so the core never has
//! to guess whether a body is an entity, a list, or a bare acknowledgement.

use serde::Deserialize;
use serde_json::Value;
use ziti_console_core::api::{Page, WriteAck};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    cause: Option<ErrorCause>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorCause {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    field: Option<String>,
}

fn envelope(body: Value) -> ClientResult<Envelope> {
    if body.is_null() {
        return Ok(Envelope::default());
    }
    Ok(serde_json::from_value(body)?)
}

/// Normalize a list response. A missing total counts as 0.
///
/// # Errors
/// Returns `ClientError::Envelope` if `data` is neither a list nor absent.
pub fn page(body: Value) -> ClientResult<Page> {
    let envelope = envelope(body)?;
    let data = match envelope.data {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(ClientError::Envelope(format!(
                "expected a list in data, got {}",
                kind(&other)
            )));
        }
    };
    let total_count = envelope
        .meta
        .and_then(|meta| meta.pagination)
        .and_then(|pagination| pagination.total_count)
        .unwrap_or(0);
    Ok(Page { data, total_count })
}

/// Normalize a single-entity response.
///
/// # Errors
/// Returns `ClientError::Envelope` if `data` is not an object.
pub fn entity(body: Value) -> ClientResult<Value> {
    match envelope(body)?.data {
        data @ Value::Object(_) => Ok(data),
        other => Err(ClientError::Envelope(format!(
            "expected an object in data, got {}",
            kind(&other)
        ))),
    }
}

/// Normalize a create/update response.
///
/// `data.id` becomes the acknowledged id, falling back to a top-level `id`
/// for controllers that answer without an envelope. A body that is empty or
/// carries an empty `data` is an acknowledgement without an id.
///
/// # Errors
/// Returns `ClientError::Json` if a non-empty body is not an envelope.
pub fn write_ack(body: Value) -> ClientResult<WriteAck> {
    let bare_id = non_empty_id(&body);
    let data = envelope(body)?.data;
    let id = non_empty_id(&data).or(bare_id);
    let data = match data {
        Value::Object(map) if !map.is_empty() => Some(Value::Object(map)),
        _ => None,
    };
    Ok(WriteAck { id, data })
}

fn non_empty_id(value: &Value) -> Option<String> {
    value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Details of a failed request: `(code, message, field)`.
///
/// The message prefers `error.cause.reason`, then `error.message`, then the
/// raw body, then `fallback`.
#[must_use]
pub fn error_details(body: &str, fallback: &str) -> (Option<String>, String, Option<String>) {
    let parsed: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let Some(error) = parsed.error else {
        let raw = body.trim();
        let message = if raw.is_empty() { fallback } else { raw };
        return (None, message.to_string(), None);
    };
    let (reason, field) = error
        .cause
        .map_or((None, None), |cause| (cause.reason, cause.field));
    let message = reason
        .filter(|m| !m.is_empty())
        .or_else(|| error.message.filter(|m| !m.is_empty()))
        .unwrap_or_else(|| {
            let raw = body.trim();
            if raw.is_empty() { fallback } else { raw }.to_string()
        });
    (error.code, message, field)
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
