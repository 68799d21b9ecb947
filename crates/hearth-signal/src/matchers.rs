//! Ordered payload-shape matchers.
//!
//! Each matcher probes one payload field and, on a hit, yields the full
//! capability/event mapping for that field. The mapper applies every matcher
//! in `PAYLOAD_MATCHERS` order and lets later hits overwrite earlier ones:
//! last match wins. That policy is intentional and pinned by tests — a
//! payload carrying several known fields is mapped by the last one in probe
//! order, not rejected.

use hearth_types::DeviceKind;

/// The mapping produced by a successful probe.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub capability: &'static str,
    pub event_type: &'static str,
    pub event_sub_type: Option<String>,
    pub value: Option<f64>,
    /// Kind to use when the device is still `Unknown` after registry lookup.
    pub inferred_kind: DeviceKind,
}

/// One entry in the ordered matcher list.
pub struct PayloadMatcher {
    /// The payload field this matcher probes, for diagnostics.
    pub field: &'static str,
    pub probe: fn(&serde_json::Value) -> Option<MatchOutcome>,
}

/// Probe order: `action`, then `temperature`, then `occupancy`.
pub const PAYLOAD_MATCHERS: &[PayloadMatcher] = &[
    PayloadMatcher {
        field: "action",
        probe: probe_action,
    },
    PayloadMatcher {
        field: "temperature",
        probe: probe_temperature,
    },
    PayloadMatcher {
        field: "occupancy",
        probe: probe_occupancy,
    },
];

/// `action` (string) → button press. The sub-type is the suffix after the
/// underscore separator (`"1_single"` → `"single"`), or the whole string
/// when there is no separator.
fn probe_action(payload: &serde_json::Value) -> Option<MatchOutcome> {
    let action = payload.get("action")?.as_str()?;
    let sub_type = match action.split_once('_') {
        Some((_, suffix)) => suffix.to_string(),
        None => action.to_string(),
    };
    Some(MatchOutcome {
        capability: "button",
        event_type: "press",
        event_sub_type: Some(sub_type),
        value: None,
        inferred_kind: DeviceKind::Button,
    })
}

/// `temperature` (number) → temperature measurement carrying the value.
fn probe_temperature(payload: &serde_json::Value) -> Option<MatchOutcome> {
    let value = payload.get("temperature")?.as_f64()?;
    Some(MatchOutcome {
        capability: "temperature",
        event_type: "measurement",
        event_sub_type: None,
        value: Some(value),
        inferred_kind: DeviceKind::Thermometer,
    })
}

/// `occupancy` (boolean) → motion detection, sub-type `active`/`inactive`.
fn probe_occupancy(payload: &serde_json::Value) -> Option<MatchOutcome> {
    let occupied = payload.get("occupancy")?.as_bool()?;
    Some(MatchOutcome {
        capability: "motion",
        event_type: "detection",
        event_sub_type: Some(if occupied { "active" } else { "inactive" }.to_string()),
        value: None,
        inferred_kind: DeviceKind::MotionSensor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matcher_order_is_action_temperature_occupancy() {
        let fields: Vec<&str> = PAYLOAD_MATCHERS.iter().map(|m| m.field).collect();
        assert_eq!(fields, ["action", "temperature", "occupancy"]);
    }

    #[test]
    fn action_probe_splits_on_underscore() {
        let outcome = probe_action(&json!({"action": "2_double"})).expect("should match");
        assert_eq!(outcome.event_sub_type.as_deref(), Some("double"));
        assert_eq!(outcome.capability, "button");
        assert_eq!(outcome.event_type, "press");
    }

    #[test]
    fn action_probe_rejects_non_string() {
        assert!(probe_action(&json!({"action": 3})).is_none());
        assert!(probe_action(&json!({"other": "x"})).is_none());
    }

    #[test]
    fn temperature_probe_requires_number() {
        let outcome = probe_temperature(&json!({"temperature": -4.25})).expect("should match");
        assert_eq!(outcome.value, Some(-4.25));
        assert!(probe_temperature(&json!({"temperature": "cold"})).is_none());
        assert!(probe_temperature(&json!({"temperature": true})).is_none());
    }

    #[test]
    fn occupancy_probe_requires_bool() {
        let outcome = probe_occupancy(&json!({"occupancy": true})).expect("should match");
        assert_eq!(outcome.event_sub_type.as_deref(), Some("active"));
        assert!(probe_occupancy(&json!({"occupancy": "yes"})).is_none());
        assert!(probe_occupancy(&json!({"occupancy": 1})).is_none());
    }
}
