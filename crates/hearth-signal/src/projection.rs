//! Projection of derived records from a canonical signal event.
//!
//! Derivation is pure; persistence of the results belongs to the caller's
//! repository collaborators. The ingest pipeline keeps using the in-memory
//! projection for rule evaluation and broadcast even when persistence fails.

use hearth_types::{EventCategory, SensorReading, SignalEvent, TriggerEvent};
use uuid::Uuid;

/// The derived records for one signal event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub readings: Vec<SensorReading>,
    pub triggers: Vec<TriggerEvent>,
}

/// Derives readings and triggers from a signal event.
///
/// A telemetry event with a numeric value yields exactly one reading whose
/// metric is the event's capability. A trigger-category event yields exactly
/// one trigger event typed `capability:subtype` (or the bare capability).
pub fn project(event: &SignalEvent) -> Projection {
    let mut projection = Projection::default();

    match event.event_category {
        EventCategory::Telemetry => {
            if let Some(value) = event.value {
                projection.readings.push(SensorReading {
                    id: Uuid::new_v4(),
                    device_id: event.device_id.clone(),
                    metric: event.capability.clone(),
                    value,
                    unit: metric_unit(&event.capability).map(str::to_string),
                    timestamp_utc: event.timestamp_utc,
                });
            }
        }
        EventCategory::Trigger => {
            let trigger_type = match &event.event_sub_type {
                Some(sub) => format!("{}:{}", event.capability, sub),
                None => event.capability.clone(),
            };
            projection.triggers.push(TriggerEvent {
                id: Uuid::new_v4(),
                device_id: event.device_id.clone(),
                trigger_type,
                timestamp_utc: event.timestamp_utc,
                source_signal_event_id: Some(event.id),
            });
        }
    }

    projection
}

/// Display unit for a metric, where one is conventional.
fn metric_unit(metric: &str) -> Option<&'static str> {
    match metric {
        "temperature" => Some("°C"),
        _ => None,
    }
}
