//! Core types and traits for the partnergate workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! gateway: the cached service [`Credential`], the fixed upstream error
//! taxonomy, and the [`TokenStore`] seam that storage backends implement.

pub mod error;
pub mod token;
pub mod traits;
pub mod url;

pub use error::{AuthError, ErrorKind, GatewayError, StoreError};
pub use token::{Credential, unix_now};
pub use traits::TokenStore;
pub use url::join_url;
