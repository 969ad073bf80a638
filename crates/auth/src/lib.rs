//! Service-token lifecycle for the upstream partner API.
//!
//! [`ServiceLogin`] exchanges the configured service email/password for a
//! bearer token; [`TokenManager`] caches it in a [`TokenStore`] and renews it
//! on demand, collapsing concurrent renewals into one login.
//!
//! [`TokenStore`]: partnergate_types::TokenStore

pub mod login;
pub mod manager;

pub use login::{LoginGrant, ServiceCredentials, ServiceLogin};
pub use manager::TokenManager;
