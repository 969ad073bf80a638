//! Service credential representation and expiry logic.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// A cached service-level bearer token.
///
/// Serialised as `{"token", "created_at", "expires_at"}` with epoch-second
/// timestamps. Credentials are never mutated in place; a renewal replaces the
/// stored value wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl Credential {
    /// Issue a credential created now.
    ///
    /// `expires_at` falls back to `now + ttl` when the caller has no explicit
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidExpiry`] if the resulting expiry is not
    /// strictly after the creation time.
    pub fn issue(
        token: impl Into<String>,
        expires_at: Option<u64>,
        ttl: Duration,
    ) -> Result<Self, StoreError> {
        let created_at = unix_now();
        let expires_at = expires_at.unwrap_or_else(|| created_at.saturating_add(ttl.as_secs()));
        if expires_at <= created_at {
            return Err(StoreError::InvalidExpiry {
                created_at,
                expires_at,
            });
        }
        Ok(Self {
            token: token.into(),
            created_at,
            expires_at,
        })
    }

    /// Validity is strict: a credential expiring exactly at `now` is expired.
    #[must_use]
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(unix_now())
    }

    /// Seconds left before expiry, zero once expired.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.expires_at.saturating_sub(unix_now())
    }
}
