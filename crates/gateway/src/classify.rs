//! Upstream status → [`GatewayError`] mapping.

use partnergate_types::{ErrorKind, GatewayError};
use serde_json::Value;

/// Extract `message` from an error body, defaulting to `HTTP Error: <status>`
/// when the body is not JSON or has no string `message`.
#[must_use]
pub fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP Error: {status}"))
}

/// Classify a non-success upstream response. Total over every status.
#[must_use]
pub fn classify(status: u16, body: &[u8]) -> GatewayError {
    let message = error_message(status, body);
    let (kind, message) = match status {
        401 => (ErrorKind::Unauthorized, format!("Unauthorized: {message}")),
        403 => (ErrorKind::Forbidden, format!("Forbidden: {message}")),
        404 => (ErrorKind::NotFound, format!("Not Found: {message}")),
        422 => (
            ErrorKind::ValidationFailed,
            format!("Validation Error: {message}"),
        ),
        _ => (
            ErrorKind::ServerError,
            format!("API Error ({status}): {message}"),
        ),
    };
    GatewayError::new(kind, Some(status), message)
}
