//! Shared types, error definitions, and constants for the Hearth hub.
//!
//! This crate provides the foundational types used across all Hearth crates:
//! the canonical signal event model, derived reading/trigger records, custom
//! rule definitions, and the progress payloads carried on the real-time
//! broadcast streams.
//!
//! No crate in the workspace depends on anything *except* `hearth-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod progress;
mod rule;

pub use progress::{DevicePairingProgress, DeviceStateUpdate, DeviceSyncProgress};
pub use rule::{CustomTriggerLog, CustomTriggerRule, RuleOperator};

/// The kind of physical device behind a signal.
///
/// Resolved by static device-id lookup first; payload-shape inference may
/// upgrade `Unknown` but never overrides an already-resolved kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Kind could not be determined.
    Unknown,
    /// A push button or remote.
    Button,
    /// A motion / occupancy sensor.
    MotionSensor,
    /// A door/window contact sensor.
    ContactSensor,
    /// A temperature sensor.
    Thermometer,
    /// A light or lamp.
    Light,
    /// A wall switch.
    Switch,
    /// A smart plug / outlet.
    Outlet,
}

impl DeviceKind {
    /// Returns the canonical string label for this kind.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Button => "BUTTON",
            Self::MotionSensor => "MOTION_SENSOR",
            Self::ContactSensor => "CONTACT_SENSOR",
            Self::Thermometer => "THERMOMETER",
            Self::Light => "LIGHT",
            Self::Switch => "SWITCH",
            Self::Outlet => "OUTLET",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = ParseDeviceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "BUTTON" => Ok(Self::Button),
            "MOTION_SENSOR" => Ok(Self::MotionSensor),
            "CONTACT_SENSOR" => Ok(Self::ContactSensor),
            "THERMOMETER" => Ok(Self::Thermometer),
            "LIGHT" => Ok(Self::Light),
            "SWITCH" => Ok(Self::Switch),
            "OUTLET" => Ok(Self::Outlet),
            _ => Err(ParseDeviceKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown device kind label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown device kind: {0}")]
pub struct ParseDeviceKindError(pub String);

/// Whether a signal event demands automation action or is a passive update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCategory {
    /// Discrete action demanding downstream automation (button press,
    /// motion detection).
    Trigger,
    /// Passive state/measurement update.
    Telemetry,
}

impl EventCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Trigger => "TRIGGER",
            Self::Telemetry => "TELEMETRY",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EventCategory {
    type Err = ParseEventCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRIGGER" => Ok(Self::Trigger),
            "TELEMETRY" => Ok(Self::Telemetry),
            _ => Err(ParseEventCategoryError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown event category label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event category: {0}")]
pub struct ParseEventCategoryError(pub String);

/// Canonical normalized representation of one inbound device message.
///
/// Immutable once created. Identity is `id`, assigned at mapping time;
/// `timestamp_utc` is assigned at ingestion, never taken from the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    /// Globally unique event id, assigned at mapping time.
    pub id: Uuid,
    /// Origin of the message (currently always `"mqtt"`).
    pub source: String,
    /// Device identifier derived from the topic.
    pub device_id: String,
    /// Logical location (first path segment of a multi-segment device id).
    pub location: Option<String>,
    /// What the device reported about: `"button"`, `"temperature"`, `"motion"`, …
    pub capability: String,
    /// What happened: `"press"`, `"measurement"`, `"detection"`, …
    pub event_type: String,
    /// Refinement of the event type (`"single"`, `"active"`, …).
    pub event_sub_type: Option<String>,
    /// Numeric payload value, when the matched field carried one.
    pub value: Option<f64>,
    /// Ingestion timestamp.
    pub timestamp_utc: DateTime<Utc>,
    /// The topic the message arrived on, unmodified.
    pub raw_topic: String,
    /// The raw JSON payload text, unmodified.
    pub raw_payload: String,
    /// Resolved or inferred device kind.
    pub device_kind: DeviceKind,
    /// Trigger vs. telemetry classification.
    pub event_category: EventCategory,
}

/// A derived numeric telemetry data point for a device + metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub id: Uuid,
    pub device_id: String,
    /// Metric name; equals the source event's capability.
    pub metric: String,
    pub value: f64,
    pub unit: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
}

/// A derived or rule-synthesized discrete "something happened" record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub id: Uuid,
    pub device_id: String,
    /// `"capability:subtype"`, plain capability, or a rule's trigger type.
    pub trigger_type: String,
    pub timestamp_utc: DateTime<Utc>,
    /// The signal event this trigger was derived from, if any. Rule-fired
    /// triggers reference the event whose reading fired the rule.
    pub source_signal_event_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_kind_round_trip() {
        for kind in [
            DeviceKind::Unknown,
            DeviceKind::Button,
            DeviceKind::MotionSensor,
            DeviceKind::ContactSensor,
            DeviceKind::Thermometer,
            DeviceKind::Light,
            DeviceKind::Switch,
            DeviceKind::Outlet,
        ] {
            let label = kind.label();
            assert_eq!(label.parse::<DeviceKind>().ok(), Some(kind));
        }
    }

    #[test]
    fn device_kind_invalid_label() {
        assert!("TOASTER".parse::<DeviceKind>().is_err());
        assert!("".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn event_category_round_trip() {
        for cat in [EventCategory::Trigger, EventCategory::Telemetry] {
            assert_eq!(cat.label().parse::<EventCategory>().ok(), Some(cat));
        }
        assert!("OTHER".parse::<EventCategory>().is_err());
    }

    #[test]
    fn signal_event_serializes_camel_case() {
        let event = SignalEvent {
            id: Uuid::new_v4(),
            source: "mqtt".to_string(),
            device_id: "frontroom/button1".to_string(),
            location: Some("frontroom".to_string()),
            capability: "button".to_string(),
            event_type: "press".to_string(),
            event_sub_type: Some("single".to_string()),
            value: None,
            timestamp_utc: Utc::now(),
            raw_topic: "devices/frontroom/button1".to_string(),
            raw_payload: r#"{"action":"1_single"}"#.to_string(),
            device_kind: DeviceKind::Button,
            event_category: EventCategory::Trigger,
        };

        let json = serde_json::to_value(&event).expect("serialization should not fail");
        assert!(json.get("deviceId").is_some(), "expected camelCase deviceId");
        assert!(json.get("eventSubType").is_some(), "expected camelCase eventSubType");
        assert!(json.get("timestampUtc").is_some(), "expected camelCase timestampUtc");
        assert!(json.get("device_id").is_none(), "snake_case device_id should not be present");
    }
}
