//! Credential storage backends for the cached service token.
//!
//! Provides an in-memory store for testing and a JSON-file store for production.

pub mod file;
pub mod memory;

pub use file::FileTokenStore;
pub use memory::InMemoryTokenStore;
