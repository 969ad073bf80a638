//! HTTP proxy layer: axum router, route handlers, and error mapping.
//!
//! Exposes the partner API to the dashboard under `/api/*`, wrapping every
//! upstream answer in a `{"success": ..}` envelope, plus health and call
//! statistics endpoints.

mod error;
mod passthrough;

pub use error::ApiError;

use arc_swap::ArcSwap;
use axum::{Json, Router, extract::State, routing::get};
use partnergate_config::Config;
use partnergate_gateway::{RequestGateway, StatsSnapshot};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state passed to all route handlers.
pub struct AppState {
    /// Server configuration, atomically swappable for hot-reloading.
    pub config: Arc<ArcSwap<Config>>,
    /// Outbound gateway to the partner API.
    pub gateway: Arc<RequestGateway>,
}

impl AppState {
    pub fn new(config: Arc<ArcSwap<Config>>, gateway: Arc<RequestGateway>) -> Arc<Self> {
        Arc::new(Self { config, gateway })
    }
}

/// Build the full axum router.
///
/// Routes:
/// - GET  /health             liveness plus service-token status
/// - GET  /gateway/stats      outbound call counters
/// - ANY  /api/{*path}        passthrough to the upstream partner API
///   (GET, POST, PUT, DELETE; other methods answer 405)
pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/gateway/stats", get(stats))
        .route(
            "/api/{*path}",
            get(passthrough::forward)
                .post(passthrough::forward)
                .put(passthrough::forward)
                .delete(passthrough::forward),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let upstream = state.config.load().upstream.base_url.clone();
    let service_token = match state.gateway.tokens().credential().await {
        Ok(Some(cred)) => json!({
            "cached": true,
            "valid": cred.is_valid(),
            "expires_at": cred.expires_at,
        }),
        Ok(None) => json!({"cached": false}),
        Err(e) => {
            tracing::warn!(error = %e, "service token store unreadable");
            json!({"cached": false, "error": e.to_string()})
        }
    };
    Json(json!({
        "status": "ok",
        "upstream": upstream,
        "service_token": service_token,
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsSnapshot> {
    Json(state.gateway.stats().snapshot())
}
