//! The ingestion worker: broker intake, mapping, projection, rules,
//! broadcast, webhook.
//!
//! Messages arrive on a bounded mpsc channel (the logical broker
//! subscription; the broker client is an external collaborator that drives
//! the sending half). Each message's pipeline runs as its own spawned task,
//! so messages — including messages for the same device — are processed
//! concurrently. Persistence and webhook delivery are fire-and-forget
//! relative to the pipeline: their failures are logged with the event id,
//! never propagated.

use crate::AppState;
use hearth_broadcast::BroadcastPayload;
use hearth_pipeline::{PipelineTracker, StageCategory};
use hearth_rules::RuleFire;
use hearth_signal::{is_bridge_topic, map_signal, project, DEVICE_TOPIC_PREFIX};
use hearth_types::{EventCategory, SensorReading, SignalEvent, TriggerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One raw message from the broker subscription.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Creates the bounded intake channel for broker messages.
pub fn ingest_channel(
    capacity: usize,
) -> (mpsc::Sender<BrokerMessage>, mpsc::Receiver<BrokerMessage>) {
    mpsc::channel(capacity)
}

/// Drains the intake channel, spawning one pipeline task per message.
///
/// Runs until the sending half is dropped.
pub async fn run_ingest_worker(state: Arc<AppState>, mut rx: mpsc::Receiver<BrokerMessage>) {
    tracing::info!("ingest worker started");
    while let Some(message) = rx.recv().await {
        let state = state.clone();
        tokio::spawn(async move {
            process_message(state, message).await;
        });
    }
    tracing::info!("ingest channel closed, worker stopping");
}

/// Runs the full pipeline for one broker message.
pub async fn process_message(state: Arc<AppState>, message: BrokerMessage) {
    if is_bridge_topic(&message.topic) {
        tracing::debug!(topic = %message.topic, "skipping bridge topic");
        return;
    }

    let device_id = message
        .topic
        .strip_prefix(DEVICE_TOPIC_PREFIX)
        .unwrap_or(&message.topic)
        .to_string();
    let mut tracker = PipelineTracker::begin(device_id, None);
    tracker.stage("Parse", StageCategory::Signal);

    // Malformed input: logged and dropped, the pipeline does not proceed.
    let payload: serde_json::Value = match serde_json::from_slice(&message.payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(topic = %message.topic, "dropping non-JSON payload: {}", e);
            return;
        }
    };

    let event = map_signal(&message.topic, &payload, &state.registry);
    tracing::debug!(
        event_id = %event.id,
        device_id = %event.device_id,
        capability = %event.capability,
        category = %event.event_category,
        "mapped signal event"
    );

    tracker.stage("Projection", StageCategory::Db);
    let projection = project(&event);

    tracker.stage("Database", StageCategory::Db);
    spawn_persist(
        state.clone(),
        event.clone(),
        projection.readings.clone(),
        projection.triggers.clone(),
    );

    tracker.stage("RuleLookup", StageCategory::Automation);
    let fires: Vec<RuleFire> = projection
        .readings
        .iter()
        .flat_map(|reading| state.rules.evaluate(reading, Some(event.id)))
        .collect();

    if !fires.is_empty() {
        tracker.stage("Automation", StageCategory::Automation);
        tracker.note_automation(&fires[0].rule_name);
        spawn_persist_fires(state.clone(), event.id, fires.clone());
    }

    tracker.stage("Broadcast", StageCategory::Broadcast);
    state
        .broadcaster
        .publish(BroadcastPayload::Signal(event.clone()));
    for reading in &projection.readings {
        state
            .broadcaster
            .publish(BroadcastPayload::Reading(reading.clone()));
    }
    let fired_triggers: Vec<TriggerEvent> = fires.into_iter().map(|f| f.trigger).collect();
    for trigger in projection.triggers.iter().chain(fired_triggers.iter()) {
        state
            .broadcaster
            .publish(BroadcastPayload::Trigger(trigger.clone()));
    }

    // Only trigger-category traffic goes out to webhooks, so automation
    // systems never see a feedback loop of their own telemetry.
    if state.webhook.is_configured()
        && (event.event_category == EventCategory::Trigger || !fired_triggers.is_empty())
    {
        tracker.stage("Webhook", StageCategory::Webhook);
        spawn_webhooks(state.clone(), event.clone(), fired_triggers);
    }

    let timeline = tracker.finish();
    state
        .broadcaster
        .publish(BroadcastPayload::Timeline(timeline));
}

/// Persists the event and its projections off the pipeline's critical path.
fn spawn_persist(
    state: Arc<AppState>,
    event: SignalEvent,
    readings: Vec<SensorReading>,
    triggers: Vec<TriggerEvent>,
) {
    tokio::task::spawn_blocking(move || {
        let conn = match state.pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(event_id = %event.id, "persist skipped, pool unavailable: {}", e);
                return;
            }
        };

        if let Err(e) = hearth_store::insert_signal_event(&conn, &event) {
            tracing::error!(event_id = %event.id, "failed to persist signal event: {}", e);
        }
        if let Err(e) = hearth_store::insert_readings(&conn, &readings) {
            tracing::error!(event_id = %event.id, "failed to persist readings: {}", e);
        }
        if let Err(e) = hearth_store::insert_trigger_events(&conn, &triggers) {
            tracing::error!(event_id = %event.id, "failed to persist trigger events: {}", e);
        }
    });
}

/// Persists rule firings: audit log rows, synthetic triggers, and the rules'
/// last-fired stamps.
fn spawn_persist_fires(state: Arc<AppState>, event_id: uuid::Uuid, fires: Vec<RuleFire>) {
    tokio::task::spawn_blocking(move || {
        let conn = match state.pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(%event_id, "rule persist skipped, pool unavailable: {}", e);
                return;
            }
        };

        for fire in &fires {
            if let Err(e) = hearth_rules::append_log(&conn, &fire.log) {
                tracing::error!(%event_id, rule_id = %fire.rule_id, "failed to append rule log: {}", e);
            }
            if let Err(e) = hearth_rules::set_last_fired(&conn, fire.rule_id, fire.log.fired_utc) {
                // Rule may have been deleted between evaluation and persist.
                tracing::warn!(%event_id, rule_id = %fire.rule_id, "failed to stamp last_fired: {}", e);
            }
            if let Err(e) =
                hearth_store::insert_trigger_events(&conn, std::slice::from_ref(&fire.trigger))
            {
                tracing::error!(%event_id, rule_id = %fire.rule_id, "failed to persist fired trigger: {}", e);
            }
        }
    });
}

/// Pushes the trigger-category event and any fired triggers to webhooks.
fn spawn_webhooks(state: Arc<AppState>, event: SignalEvent, fired_triggers: Vec<TriggerEvent>) {
    tokio::spawn(async move {
        if event.event_category == EventCategory::Trigger {
            state.webhook.notify(event.id, &event).await;
        }
        for trigger in &fired_triggers {
            state.webhook.notify(trigger.id, trigger).await;
        }
    });
}
