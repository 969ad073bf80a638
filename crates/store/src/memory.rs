//! In-memory credential store backed by an `Option` behind a `Mutex`.

use async_trait::async_trait;
use partnergate_types::{Credential, TokenStore, traits::Result};
use std::{sync::Mutex, time::Duration};

/// An in-memory [`TokenStore`] implementation for testing and ephemeral use.
pub struct InMemoryTokenStore {
    slot: Mutex<Option<Credential>>,
    ttl: Duration,
}

impl InMemoryTokenStore {
    /// Creates a new empty store whose `save` applies `ttl` by default.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    /// Creates a store pre-seeded with `credential`.
    #[must_use]
    pub fn with_credential(credential: Credential, ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
            ttl,
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self) -> Result<Option<Credential>> {
        Ok(self.slot().clone())
    }

    async fn put(&self, credential: &Credential) -> Result<()> {
        *self.slot() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot().take();
        Ok(())
    }

    fn default_ttl(&self) -> Duration {
        self.ttl
    }
}
