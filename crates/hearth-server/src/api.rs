//! HTTP API handlers: broker bridge intake, query endpoints, rule CRUD.
//!
//! Query controllers are thin: parameter handling, a blocking repository
//! call, JSON out. Every rule mutation refreshes the engine cache before the
//! response is sent, so the change is visible to the next evaluated reading
//! without a restart.

use crate::ingest::BrokerMessage;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use hearth_rules::{CreateRuleParams, RuleError, UpdateRuleParams};
use hearth_types::{
    CustomTriggerLog, CustomTriggerRule, RuleOperator, SensorReading, SignalEvent, TriggerEvent,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Query parameter for the list endpoints.
#[derive(Debug, Deserialize)]
pub struct TakeQuery {
    pub take: Option<u32>,
}

fn clamp_take(take: Option<u32>) -> u32 {
    take.unwrap_or(50).clamp(1, 500)
}

/// Request body for `POST /api/ingest`.
///
/// `payload` is the raw payload text exactly as the broker delivered it; it
/// may turn out not to be JSON, in which case the worker drops it (logged).
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub topic: String,
    pub payload: String,
}

/// `POST /api/ingest` — the broker bridge surface.
///
/// Always returns 202: intake is fire-and-forget and a full queue drops the
/// message (logged) rather than applying backpressure to the bridge.
pub async fn ingest_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> StatusCode {
    let message = BrokerMessage {
        topic: request.topic,
        payload: request.payload.into_bytes(),
    };
    if let Err(e) = state.ingest_tx.try_send(message) {
        tracing::warn!("ingest queue full, dropping message: {}", e);
    }
    StatusCode::ACCEPTED
}

/// Runs a blocking repository call on the pool, mapping failures to 500.
async fn run_query<T, F>(state: Arc<AppState>, query: F) -> Result<Json<T>, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, hearth_store::StoreError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!("db pool unavailable: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        query(&conn).map_err(|e| {
            tracing::error!("query failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    })
    .await;

    match result {
        Ok(Ok(value)) => Ok(Json(value)),
        Ok(Err(code)) => Err(code),
        Err(e) => {
            tracing::error!("query task failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `GET /api/signals/recent`
pub async fn recent_signals_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TakeQuery>,
) -> Result<Json<Vec<SignalEvent>>, StatusCode> {
    let take = clamp_take(query.take);
    run_query(state, move |conn| {
        hearth_store::recent_signal_events(conn, take)
    })
    .await
}

/// `GET /api/readings/recent`
pub async fn recent_readings_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TakeQuery>,
) -> Result<Json<Vec<SensorReading>>, StatusCode> {
    let take = clamp_take(query.take);
    run_query(state, move |conn| hearth_store::recent_readings(conn, take)).await
}

/// `GET /api/readings/{deviceId}/{metric}`
pub async fn readings_by_device_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((device_id, metric)): Path<(String, String)>,
    Query(query): Query<TakeQuery>,
) -> Result<Json<Vec<SensorReading>>, StatusCode> {
    let take = clamp_take(query.take);
    run_query(state, move |conn| {
        hearth_store::readings_by_device_and_metric(conn, &device_id, &metric, take)
    })
    .await
}

/// `GET /api/triggers/recent`
pub async fn recent_triggers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TakeQuery>,
) -> Result<Json<Vec<TriggerEvent>>, StatusCode> {
    let take = clamp_take(query.take);
    run_query(state, move |conn| {
        hearth_store::recent_trigger_events(conn, take)
    })
    .await
}

// ── Rule CRUD ────────────────────────────────────────────────────────

/// Request body for `POST /api/rules`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub trigger_type: String,
    pub device_id: String,
    pub metric: String,
    pub operator: RuleOperator,
    pub threshold: f64,
    pub threshold2: Option<f64>,
    pub cooldown_seconds: Option<i64>,
}

fn default_enabled() -> bool {
    true
}

/// Request body for `PUT /api/rules/{id}`. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub trigger_type: Option<String>,
    pub device_id: Option<String>,
    pub metric: Option<String>,
    pub operator: Option<RuleOperator>,
    pub threshold: Option<f64>,
    pub threshold2: Option<f64>,
    pub cooldown_seconds: Option<i64>,
}

fn rule_error_status(e: &RuleError) -> StatusCode {
    match e {
        RuleError::NotFound(_) => StatusCode::NOT_FOUND,
        RuleError::Database(_) => {
            tracing::error!("rule operation failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Runs a blocking rule mutation and refreshes the engine cache before
/// returning, so the change is live for the next evaluated reading.
async fn run_rule_mutation<T, F>(state: Arc<AppState>, mutation: F) -> Result<T, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, RuleError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!("db pool unavailable: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        let value = mutation(&conn).map_err(|e| rule_error_status(&e))?;
        if let Err(e) = state.rules.refresh(&conn) {
            // The mutation is durable; a failed refresh only delays
            // visibility until the next background refresh.
            tracing::error!("rule cache refresh failed after mutation: {}", e);
        }
        Ok(value)
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(e) => {
            tracing::error!("rule mutation task failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `POST /api/rules`
pub async fn create_rule_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<CreateRuleBody>,
) -> Result<(StatusCode, Json<CustomTriggerRule>), StatusCode> {
    let params = CreateRuleParams {
        name: body.name,
        description: body.description,
        enabled: body.enabled,
        trigger_type: body.trigger_type,
        device_id: body.device_id,
        metric: body.metric,
        operator: body.operator,
        threshold: body.threshold,
        threshold2: body.threshold2,
        cooldown_seconds: body.cooldown_seconds,
    };

    let rule =
        run_rule_mutation(state, move |conn| hearth_rules::create_rule(conn, &params)).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// `GET /api/rules`
pub async fn list_rules_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<CustomTriggerRule>>, StatusCode> {
    let result = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!("db pool unavailable: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        hearth_rules::list_rules(&conn).map_err(|e| rule_error_status(&e))
    })
    .await;

    match result {
        Ok(Ok(rules)) => Ok(Json(rules)),
        Ok(Err(code)) => Err(code),
        Err(e) => {
            tracing::error!("list rules task failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `GET /api/rules/{id}`
pub async fn get_rule_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<CustomTriggerRule>, StatusCode> {
    let result = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!("db pool unavailable: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        hearth_rules::get_rule(&conn, rule_id).map_err(|e| rule_error_status(&e))
    })
    .await;

    match result {
        Ok(Ok(rule)) => Ok(Json(rule)),
        Ok(Err(code)) => Err(code),
        Err(e) => {
            tracing::error!("get rule task failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `PUT /api/rules/{id}`
pub async fn update_rule_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
    Json(body): Json<UpdateRuleBody>,
) -> Result<Json<CustomTriggerRule>, StatusCode> {
    let updates = UpdateRuleParams {
        name: body.name,
        description: body.description,
        enabled: body.enabled,
        trigger_type: body.trigger_type,
        device_id: body.device_id,
        metric: body.metric,
        operator: body.operator,
        threshold: body.threshold,
        threshold2: body.threshold2,
        cooldown_seconds: body.cooldown_seconds,
    };

    let rule = run_rule_mutation(state, move |conn| {
        hearth_rules::update_rule(conn, rule_id, &updates)
    })
    .await?;
    Ok(Json(rule))
}

/// `DELETE /api/rules/{id}`
pub async fn delete_rule_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    run_rule_mutation(state, move |conn| hearth_rules::delete_rule(conn, rule_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/rules/{id}/logs`
pub async fn rule_logs_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
    Query(query): Query<TakeQuery>,
) -> Result<Json<Vec<CustomTriggerLog>>, StatusCode> {
    let take = clamp_take(query.take);
    let result = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!("db pool unavailable: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        // Distinguish "rule missing" from "rule with no logs".
        hearth_rules::get_rule(&conn, rule_id).map_err(|e| rule_error_status(&e))?;
        hearth_rules::logs_for_rule(&conn, rule_id, take).map_err(|e| rule_error_status(&e))
    })
    .await;

    match result {
        Ok(Ok(logs)) => Ok(Json(logs)),
        Ok(Err(code)) => Err(code),
        Err(e) => {
            tracing::error!("rule logs task failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
