//! Signal mapping and projection for the Hearth hub.
//!
//! Turns a `(topic, parsed JSON payload)` pair into a canonical
//! [`SignalEvent`], and derives the secondary records (readings, trigger
//! events) from it. Mapping is total over valid JSON: a payload that matches
//! no known shape maps to an `unknown` capability rather than failing, so the
//! caller only has to guard against non-JSON input.
//!
//! Payload shapes are dispatched through an ordered matcher list (see
//! [`PAYLOAD_MATCHERS`]); the device kind comes from the [`DeviceRegistry`]
//! first and payload-shape inference second.

mod matchers;
mod projection;
mod registry;

pub use matchers::{MatchOutcome, PayloadMatcher, PAYLOAD_MATCHERS};
pub use projection::{project, Projection};
pub use registry::DeviceRegistry;

use chrono::Utc;
use hearth_types::{DeviceKind, EventCategory, SignalEvent};
use uuid::Uuid;

/// Topic namespace prefix for device messages.
pub const DEVICE_TOPIC_PREFIX: &str = "devices/";

/// Administrative bridge sub-topic, excluded from signal processing.
pub const BRIDGE_TOPIC_PREFIX: &str = "devices/bridge";

/// Returns true for topics that must never be mapped (broker bridge
/// administration traffic).
pub fn is_bridge_topic(topic: &str) -> bool {
    topic == BRIDGE_TOPIC_PREFIX
        || topic
            .strip_prefix(BRIDGE_TOPIC_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Maps a topic and parsed payload to a canonical [`SignalEvent`].
///
/// Total over valid JSON: never fails, never panics. The fresh event id and
/// the ingestion timestamp are the only non-pure inputs.
pub fn map_signal(
    topic: &str,
    payload: &serde_json::Value,
    registry: &DeviceRegistry,
) -> SignalEvent {
    let device_id = topic
        .strip_prefix(DEVICE_TOPIC_PREFIX)
        .unwrap_or(topic)
        .to_string();

    // Multi-segment device ids carry their location as the first segment.
    let location = device_id
        .split_once('/')
        .map(|(head, _)| head.to_string());

    // Static registry lookup first, then name-based inference. Payload
    // matchers below may still upgrade Unknown, never override.
    let mut device_kind = registry
        .lookup(&device_id)
        .unwrap_or_else(|| infer_kind_from_name(&device_id));

    let mut capability = "unknown".to_string();
    let mut event_type = "unknown".to_string();
    let mut event_sub_type = None;
    let mut value = None;

    // Ordered probe: every matcher that hits overwrites the mapping, so the
    // LAST matching field wins. That order is fixed and documented in
    // `PAYLOAD_MATCHERS`.
    for matcher in PAYLOAD_MATCHERS {
        if let Some(outcome) = (matcher.probe)(payload) {
            capability = outcome.capability.to_string();
            event_type = outcome.event_type.to_string();
            event_sub_type = outcome.event_sub_type;
            value = outcome.value;
            if device_kind == DeviceKind::Unknown {
                device_kind = outcome.inferred_kind;
            }
        }
    }

    let event_category = classify(device_kind, &capability, &event_type);

    SignalEvent {
        id: Uuid::new_v4(),
        source: "mqtt".to_string(),
        device_id,
        location,
        capability,
        event_type,
        event_sub_type,
        value,
        timestamp_utc: Utc::now(),
        raw_topic: topic.to_string(),
        raw_payload: payload.to_string(),
        device_kind,
        event_category,
    }
}

/// Classifies an event as trigger or telemetry.
///
/// Pure function of `(device_kind, capability, event_type)`: trigger iff the
/// kind is an action-originating device AND the capability/event pair is a
/// discrete action.
pub fn classify(device_kind: DeviceKind, capability: &str, event_type: &str) -> EventCategory {
    let action_device = matches!(
        device_kind,
        DeviceKind::Button | DeviceKind::MotionSensor | DeviceKind::ContactSensor
    );
    let action_capability = matches!(capability, "button" | "motion");
    let action_event = matches!(event_type, "press" | "detection");

    if action_device && action_capability && action_event {
        EventCategory::Trigger
    } else {
        EventCategory::Telemetry
    }
}

/// Name-substring fallback when the registry has no entry for a device id.
///
/// Checked in declaration order; first hit wins.
const NAME_HINTS: &[(&str, DeviceKind)] = &[
    ("button", DeviceKind::Button),
    ("motion", DeviceKind::MotionSensor),
    ("occupancy", DeviceKind::MotionSensor),
    ("pir", DeviceKind::MotionSensor),
    ("contact", DeviceKind::ContactSensor),
    ("door", DeviceKind::ContactSensor),
    ("window", DeviceKind::ContactSensor),
    ("therm", DeviceKind::Thermometer),
    ("temp", DeviceKind::Thermometer),
    ("light", DeviceKind::Light),
    ("lamp", DeviceKind::Light),
    ("bulb", DeviceKind::Light),
    ("switch", DeviceKind::Switch),
    ("plug", DeviceKind::Outlet),
    ("outlet", DeviceKind::Outlet),
];

fn infer_kind_from_name(device_id: &str) -> DeviceKind {
    let lowered = device_id.to_ascii_lowercase();
    for (hint, kind) in NAME_HINTS {
        if lowered.contains(hint) {
            return *kind;
        }
    }
    DeviceKind::Unknown
}
