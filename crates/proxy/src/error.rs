//! API error type that maps [`GatewayError`] kinds to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use partnergate_types::{ErrorKind, GatewayError};
use serde_json::json;

/// Wrapper around [`GatewayError`] that implements [`IntoResponse`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    /// Status code shown to the dashboard for the wrapped error.
    ///
    /// Auth failures prompt a re-login, validation failures carry field
    /// errors, and everything upstream-side is reported as a bad gateway.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ServerError => StatusCode::BAD_GATEWAY,
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self(GatewayError::new(
            ErrorKind::ValidationFailed,
            None,
            format!("Validation Error: {}", message.into()),
        ))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(json!({
                "success": false,
                "message": self.0.message,
                "kind": self.0.kind,
                "requires_login": self.0.requires_login(),
            })),
        )
            .into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}
