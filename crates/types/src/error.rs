//! Error taxonomy shared across partnergate crates.

use serde::Serialize;
use std::{fmt, path::PathBuf};
use thiserror::Error;

/// The fixed set of failure classes a gateway call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationFailed,
    ServerError,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::ValidationFailed,
        Self::ServerError,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ValidationFailed => "validation_failed",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure of one outbound call.
///
/// `status` is `None` when no HTTP response was received (DNS failure,
/// refused connection, timeout).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    /// A `ServerError` for a failure where no upstream response exists.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, None, message)
    }

    /// Returns `true` if the end user should be asked to sign in again.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self.kind, ErrorKind::Unauthorized | ErrorKind::Forbidden)
    }
}

/// Service-token renewal failure.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The upstream login endpoint answered with a non-success status.
    #[error("authentication error: {message} (status {status})")]
    Rejected { status: u16, message: String },

    /// The login response was successful but carried no token.
    #[error("authentication error: login response has no token")]
    MissingToken,

    /// Service email or password is not configured.
    #[error("authentication error: service credentials are not configured")]
    MissingCredentials,

    /// A concurrent renewal this caller waited on failed; carries its message.
    #[error("{0}")]
    RenewalFailed(String),

    /// The login request never produced a response.
    #[error("authentication error: {0}")]
    Transport(String),

    /// The renewed credential could not be read or persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthError> for GatewayError {
    fn from(e: AuthError) -> Self {
        Self::transport(format!("Service token unavailable: {e}"))
    }
}

/// Durable credential storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt token file {path}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("credential expiry {expires_at} is not after creation time {created_at}")]
    InvalidExpiry { created_at: u64, expires_at: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display_is_message() {
        let err = GatewayError::new(ErrorKind::NotFound, Some(404), "Not Found: gone");
        assert_eq!(err.to_string(), "Not Found: gone");
    }

    #[test]
    fn test_transport_has_no_status() {
        let err = GatewayError::transport("connection refused");
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(err.status.is_none());
    }

    #[test]
    fn test_requires_login() {
        assert!(GatewayError::new(ErrorKind::Unauthorized, Some(401), "x").requires_login());
        assert!(GatewayError::new(ErrorKind::Forbidden, Some(403), "x").requires_login());
        assert!(!GatewayError::new(ErrorKind::NotFound, Some(404), "x").requires_login());
    }

    #[test]
    fn test_auth_error_display_carries_upstream_message() {
        let err = AuthError::Rejected {
            status: 401,
            message: "bad creds".into(),
        };
        assert!(err.to_string().contains("bad creds"));
    }

    #[test]
    fn test_renewal_failed_display_is_shared_message() {
        let leader = AuthError::Rejected {
            status: 401,
            message: "bad creds".into(),
        };
        let waiter = AuthError::RenewalFailed(leader.to_string());
        assert_eq!(waiter.to_string(), leader.to_string());
    }

    #[test]
    fn test_auth_error_into_gateway_error() {
        let err: GatewayError = AuthError::MissingCredentials.into();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(err.message.starts_with("Service token unavailable"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let v = serde_json::to_value(ErrorKind::ValidationFailed).unwrap();
        assert_eq!(v, "validation_failed");
        for kind in ErrorKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }
}
