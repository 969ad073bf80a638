//! Outbound HTTP gateway to the upstream partner API.
//!
//! [`RequestGateway`] resolves credentials (session token first, service token
//! as fallback), dispatches one request per call, and turns every non-2xx
//! response into a [`GatewayError`] via [`classify`]. Domain callers depend on
//! this crate and on [`partnergate_auth::TokenManager`] only.
//!
//! [`GatewayError`]: partnergate_types::GatewayError

mod classify;
mod client;
mod request;
pub mod stats;

pub use classify::{classify, error_message};
pub use client::RequestGateway;
pub use partnergate_types::join_url;
pub use request::{Attachment, Body, Method, MultipartBody, Query, RequestContext};
pub use stats::{GatewayStats, StatsSnapshot};
