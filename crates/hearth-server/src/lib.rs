//! Hearth server library logic.

pub mod api;
pub mod api_sse;
pub mod background;
pub mod config;
pub mod ingest;
pub mod webhook;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use hearth_broadcast::Broadcaster;
use hearth_db::DbPool;
use hearth_rules::RuleEngine;
use hearth_signal::DeviceRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use webhook::WebhookNotifier;

/// Maximum request body size (1 MiB). Device payloads are small; this
/// protects against OOM from oversized bridge posts.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers and the ingest
/// worker.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Static device-id → kind registry, snapshot-swapped on update.
    pub registry: Arc<DeviceRegistry>,
    /// Rule engine with its snapshot-swapped cache.
    pub rules: Arc<RuleEngine>,
    /// Real-time fan-out.
    pub broadcaster: Arc<Broadcaster>,
    /// Outbound webhook pushes.
    pub webhook: Arc<WebhookNotifier>,
    /// Sending half of the bounded ingest queue (the broker bridge seam).
    pub ingest_tx: mpsc::Sender<ingest::BrokerMessage>,
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by load balancers,
/// monitoring, and CI to verify the server is running.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ingest", post(api::ingest_handler))
        .route("/api/signals/recent", get(api::recent_signals_handler))
        .route("/api/readings/recent", get(api::recent_readings_handler))
        .route(
            "/api/readings/{deviceId}/{metric}",
            get(api::readings_by_device_handler),
        )
        .route("/api/triggers/recent", get(api::recent_triggers_handler))
        .route(
            "/api/rules",
            post(api::create_rule_handler).get(api::list_rules_handler),
        )
        .route(
            "/api/rules/{ruleId}",
            get(api::get_rule_handler)
                .put(api::update_rule_handler)
                .delete(api::delete_rule_handler),
        )
        .route("/api/rules/{ruleId}/logs", get(api::rule_logs_handler))
        .route("/events/stream", get(api_sse::get_event_stream_handler))
        .route(
            "/events/device/{deviceId}",
            get(api_sse::get_device_stream_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
