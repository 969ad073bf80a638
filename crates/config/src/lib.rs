//! Configuration loading and hot-reloading for the partnergate gateway.
//!
//! Uses figment for YAML + environment configuration with sensible defaults,
//! and notify + arc-swap for live file watching.

pub mod schema;
pub mod watcher;

pub use schema::{Config, LogConfig, LogFormat, ServiceConfig, UpstreamConfig};
pub use watcher::ConfigWatcher;
