//! Custom trigger rule definitions and audit log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison operator applied by a rule to an incoming reading value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOperator {
    /// Fires when `value > threshold`.
    GreaterThan,
    /// Fires when `value < threshold`.
    LessThan,
    /// Fires when `value == threshold` (exact numeric match).
    Equals,
    /// Fires when `threshold <= value <= threshold2` (inclusive at both ends).
    Between,
}

impl RuleOperator {
    /// Returns the canonical string label for this operator.
    pub fn label(self) -> &'static str {
        match self {
            Self::GreaterThan => "GREATER_THAN",
            Self::LessThan => "LESS_THAN",
            Self::Equals => "EQUALS",
            Self::Between => "BETWEEN",
        }
    }

    /// Whether this operator consumes the rule's second threshold.
    pub fn is_range(self) -> bool {
        matches!(self, Self::Between)
    }
}

impl std::fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RuleOperator {
    type Err = ParseRuleOperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GREATER_THAN" => Ok(Self::GreaterThan),
            "LESS_THAN" => Ok(Self::LessThan),
            "EQUALS" => Ok(Self::Equals),
            "BETWEEN" => Ok(Self::Between),
            _ => Err(ParseRuleOperatorError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown operator label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown rule operator: {0}")]
pub struct ParseRuleOperatorError(pub String);

/// A user-defined threshold rule evaluated against incoming readings.
///
/// Mutated by rule CRUD and by the engine itself (`last_fired_utc` on fire).
/// Logs cascade-delete with the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTriggerRule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Trigger type stamped onto synthetic trigger events fired by this rule.
    pub trigger_type: String,
    pub device_id: String,
    pub metric: String,
    pub operator: RuleOperator,
    pub threshold: f64,
    /// Upper bound, used only by range operators.
    pub threshold2: Option<f64>,
    /// Minimum seconds between fires. `None` disables cooldown.
    pub cooldown_seconds: Option<i64>,
    pub last_fired_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Immutable audit record, one per rule firing. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTriggerLog {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub fired_utc: DateTime<Utc>,
    pub device_id: String,
    pub metric: String,
    pub value: f64,
    /// Human-readable rendering of the satisfied condition, e.g. `"32 > 30"`.
    pub condition: String,
    pub generated_trigger_event_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_round_trip() {
        for op in [
            RuleOperator::GreaterThan,
            RuleOperator::LessThan,
            RuleOperator::Equals,
            RuleOperator::Between,
        ] {
            assert_eq!(op.label().parse::<RuleOperator>().ok(), Some(op));
        }
        assert!("NOT_EQUALS".parse::<RuleOperator>().is_err());
    }

    #[test]
    fn only_between_is_range() {
        assert!(RuleOperator::Between.is_range());
        assert!(!RuleOperator::GreaterThan.is_range());
        assert!(!RuleOperator::LessThan.is_range());
        assert!(!RuleOperator::Equals.is_range());
    }
}
