//! Real-time fan-out of hub events to live subscribers.
//!
//! Every published payload is delivered to the unconditional "all
//! subscribers" stream and, when it carries a device or operation key, to
//! the per-key subscriber group as well. Delivery is best-effort
//! fire-and-forget: a failed or lagged subscriber is logged and never affects
//! other subscribers or the publisher.
//!
//! No ordering is guaranteed across subscribers; within one subscriber's
//! stream the global send happens before the group-scoped send for the same
//! source event, but consumers should not rely on strict ordering between
//! the two.

use hearth_pipeline::PipelineTimeline;
use hearth_types::{
    DevicePairingProgress, DeviceStateUpdate, DeviceSyncProgress, SensorReading, SignalEvent,
    TriggerEvent,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Buffered events per subscriber before a slow consumer starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// A payload carried on the broadcast streams.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BroadcastPayload {
    Signal(SignalEvent),
    Reading(SensorReading),
    Trigger(TriggerEvent),
    Timeline(PipelineTimeline),
    SyncProgress(DeviceSyncProgress),
    PairingProgress(DevicePairingProgress),
    StateUpdate(DeviceStateUpdate),
}

impl BroadcastPayload {
    /// The event name used on the global stream.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Signal(_) => "SignalReceived",
            Self::Reading(_) => "ReadingReceived",
            Self::Trigger(_) => "TriggerReceived",
            Self::Timeline(_) => "PipelineTimeline",
            Self::SyncProgress(_) => "DeviceSyncProgress",
            Self::PairingProgress(_) => "DevicePairingProgress",
            Self::StateUpdate(_) => "DeviceStateUpdate",
        }
    }

    /// The event name used on the per-key group stream.
    pub fn scoped_event_name(&self) -> &'static str {
        match self {
            Self::Signal(_) => "DeviceSignalReceived",
            Self::Reading(_) => "DeviceReadingReceived",
            Self::Trigger(_) => "DeviceTriggerReceived",
            // Timeline and progress payloads use one name on both streams.
            Self::Timeline(_) => "PipelineTimeline",
            Self::SyncProgress(_) => "DeviceSyncProgress",
            Self::PairingProgress(_) => "DevicePairingProgress",
            Self::StateUpdate(_) => "DeviceStateUpdate",
        }
    }

    /// The subscriber-group key for this payload, when it carries one.
    pub fn group_key(&self) -> Option<&str> {
        let key = match self {
            Self::Signal(event) => event.device_id.as_str(),
            Self::Reading(reading) => reading.device_id.as_str(),
            Self::Trigger(trigger) => trigger.device_id.as_str(),
            Self::Timeline(timeline) => timeline.device_id.as_str(),
            Self::SyncProgress(progress) => progress.sync_id.as_str(),
            Self::PairingProgress(progress) => progress.pairing_id.as_str(),
            Self::StateUpdate(update) => update.device_id.as_str(),
        };
        (!key.is_empty()).then_some(key)
    }
}

/// A named event as delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub event: &'static str,
    pub data: BroadcastPayload,
}

/// Fans published payloads out to the global stream and per-key groups.
///
/// Group channels are created lazily on first subscription and pruned once
/// a publish finds them without receivers. The lock around the group map is
/// synchronous: it guards brief map operations only and is never held across
/// an `.await` point.
pub struct Broadcaster {
    all_tx: broadcast::Sender<Envelope>,
    groups: RwLock<HashMap<String, broadcast::Sender<Envelope>>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (all_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            all_tx,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to every published event.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Envelope> {
        self.all_tx.subscribe()
    }

    /// Subscribes to the group for one device or operation key.
    ///
    /// The group channel is created if it does not exist yet.
    pub fn subscribe_group(&self, key: &str) -> broadcast::Receiver<Envelope> {
        let groups = match self.groups.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = groups.get(key) {
            return tx.subscribe();
        }
        drop(groups);

        let mut groups = match self.groups.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        groups
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publishes a payload to the global stream and its group, best-effort.
    pub fn publish(&self, payload: BroadcastPayload) {
        let group_key = payload.group_key().map(str::to_string);

        let envelope = Envelope {
            event: payload.event_name(),
            data: payload.clone(),
        };
        if let Err(e) = self.all_tx.send(envelope) {
            // No live subscribers; normal during quiet periods.
            tracing::debug!(event = payload.event_name(), "no global subscribers: {}", e);
        }

        let Some(key) = group_key else {
            return;
        };

        let group_tx = {
            let groups = match self.groups.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            groups.get(&key).cloned()
        };

        if let Some(tx) = group_tx {
            let scoped = Envelope {
                event: payload.scoped_event_name(),
                data: payload,
            };
            if tx.send(scoped).is_err() {
                // Last receiver for this key is gone; drop the group.
                let mut groups = match self.groups.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if groups
                    .get(&key)
                    .is_some_and(|tx| tx.receiver_count() == 0)
                {
                    groups.remove(&key);
                    tracing::debug!(key = %key, "pruned empty subscriber group");
                }
            }
        }
    }

    /// Number of live group channels (for diagnostics).
    pub fn group_count(&self) -> usize {
        match self.groups.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_trigger(device_id: &str) -> TriggerEvent {
        TriggerEvent {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            trigger_type: "button:single".to_string(),
            timestamp_utc: Utc::now(),
            source_signal_event_id: None,
        }
    }

    fn sample_reading(device_id: &str) -> SensorReading {
        SensorReading {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            metric: "temperature".to_string(),
            value: 21.0,
            unit: None,
            timestamp_utc: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_global_and_group_subscribers() {
        let broadcaster = Broadcaster::new();
        let mut all_rx = broadcaster.subscribe_all();
        let mut group_rx = broadcaster.subscribe_group("frontroom/button1");

        broadcaster.publish(BroadcastPayload::Trigger(sample_trigger("frontroom/button1")));

        let global = all_rx.recv().await.expect("global delivery");
        assert_eq!(global.event, "TriggerReceived");

        let scoped = group_rx.recv().await.expect("group delivery");
        assert_eq!(scoped.event, "DeviceTriggerReceived");
        match scoped.data {
            BroadcastPayload::Trigger(trigger) => {
                assert_eq!(trigger.device_id, "frontroom/button1")
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_groups_do_not_receive() {
        let broadcaster = Broadcaster::new();
        let mut other_rx = broadcaster.subscribe_group("kitchen-therm");

        broadcaster.publish(BroadcastPayload::Trigger(sample_trigger("frontroom/button1")));

        assert!(matches!(
            other_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let broadcaster = Broadcaster::new();
        // Nothing to assert beyond "does not panic or block".
        broadcaster.publish(BroadcastPayload::Reading(sample_reading("kitchen-therm")));
    }

    #[tokio::test]
    async fn dropped_group_receiver_does_not_affect_global_delivery() {
        let broadcaster = Broadcaster::new();
        let mut all_rx = broadcaster.subscribe_all();

        let group_rx = broadcaster.subscribe_group("kitchen-therm");
        drop(group_rx);

        broadcaster.publish(BroadcastPayload::Reading(sample_reading("kitchen-therm")));

        let global = all_rx.recv().await.expect("global delivery survives");
        assert_eq!(global.event, "ReadingReceived");
        assert_eq!(broadcaster.group_count(), 0, "dead group should be pruned");
    }

    #[tokio::test]
    async fn progress_payloads_group_by_operation_id() {
        let broadcaster = Broadcaster::new();
        let mut sync_rx = broadcaster.subscribe_group("sync-42");

        broadcaster.publish(BroadcastPayload::SyncProgress(DeviceSyncProgress {
            sync_id: "sync-42".to_string(),
            total: 5,
            completed: 1,
            message: None,
        }));

        let envelope = sync_rx.recv().await.expect("sync group delivery");
        assert_eq!(envelope.event, "DeviceSyncProgress");
    }

    #[tokio::test]
    async fn empty_device_id_skips_group_send() {
        let broadcaster = Broadcaster::new();
        let mut all_rx = broadcaster.subscribe_all();

        broadcaster.publish(BroadcastPayload::StateUpdate(DeviceStateUpdate {
            device_id: String::new(),
            online: true,
            battery_percent: None,
            link_quality: None,
        }));

        let envelope = all_rx.recv().await.expect("global delivery");
        assert_eq!(envelope.event, "DeviceStateUpdate");
        assert_eq!(envelope.data.group_key(), None);
    }

    #[test]
    fn envelope_serializes_event_and_data() {
        let envelope = Envelope {
            event: "TriggerReceived",
            data: BroadcastPayload::Trigger(sample_trigger("d1")),
        };
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(json["event"], "TriggerReceived");
        assert_eq!(json["data"]["deviceId"], "d1");
        assert_eq!(json["data"]["triggerType"], "button:single");
    }
}
