//! Async traits shared across partnergate crates.
//!
//! Cross-crate abstractions live here so that higher layers depend only on
//! `partnergate-types`, not on each other.

use crate::{Credential, StoreError};
use async_trait::async_trait;
use std::time::Duration;

/// Convenience alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable single-slot storage for the service [`Credential`].
///
/// Implementations never evaluate expiry; that is the token manager's job.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored credential, or `None` if nothing was saved or it was cleared.
    async fn get(&self) -> Result<Option<Credential>>;
    /// Replace the stored credential. Readers never observe a partial write.
    async fn put(&self, credential: &Credential) -> Result<()>;
    /// Remove the stored credential. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<()>;
    /// Lifetime applied by [`TokenStore::save`] when no expiry is supplied.
    fn default_ttl(&self) -> Duration;

    /// Store `token` created now, expiring at `expires_at` or after the default TTL.
    async fn save(&self, token: &str, expires_at: Option<u64>) -> Result<Credential> {
        let credential = Credential::issue(token, expires_at, self.default_ttl())?;
        self.put(&credential).await?;
        Ok(credential)
    }
}
