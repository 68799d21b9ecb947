//! In-memory rule evaluation with atomic cooldown gating.

use crate::RuleError;
use chrono::{DateTime, Duration, Utc};
use hearth_types::{
    CustomTriggerLog, CustomTriggerRule, RuleOperator, SensorReading, TriggerEvent,
};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Evaluates an operator against a reading value.
///
/// `Between` is inclusive at both boundaries. A range rule missing its upper
/// bound degenerates to `value == threshold`.
pub fn condition_met(
    operator: RuleOperator,
    value: f64,
    threshold: f64,
    threshold2: Option<f64>,
) -> bool {
    match operator {
        RuleOperator::GreaterThan => value > threshold,
        RuleOperator::LessThan => value < threshold,
        RuleOperator::Equals => value == threshold,
        RuleOperator::Between => {
            let upper = threshold2.unwrap_or(threshold);
            threshold <= value && value <= upper
        }
    }
}

/// Human-readable rendering of a satisfied condition, stored in the audit log.
pub fn condition_text(
    operator: RuleOperator,
    value: f64,
    threshold: f64,
    threshold2: Option<f64>,
) -> String {
    match operator {
        RuleOperator::GreaterThan => format!("{value} > {threshold}"),
        RuleOperator::LessThan => format!("{value} < {threshold}"),
        RuleOperator::Equals => format!("{value} == {threshold}"),
        RuleOperator::Between => {
            let upper = threshold2.unwrap_or(threshold);
            format!("{threshold} <= {value} <= {upper}")
        }
    }
}

/// One rule firing: the synthetic trigger event plus its audit record.
///
/// The caller persists both and stamps the rule row's `last_fired_utc`.
#[derive(Debug, Clone)]
pub struct RuleFire {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub trigger: TriggerEvent,
    pub log: CustomTriggerLog,
}

/// A cached rule plus its cooldown gate.
///
/// The gate mutex makes the cooldown check and the last-fired update one
/// atomic region; it is held only for that region and never across `.await`.
struct RuleSlot {
    rule: CustomTriggerRule,
    last_fired: Mutex<Option<DateTime<Utc>>>,
}

type RuleCache = HashMap<(String, String), Vec<Arc<RuleSlot>>>;

/// Evaluates enabled rules against incoming readings.
///
/// The cache is a snapshot behind an `RwLock<Arc<..>>`: readers clone the
/// `Arc` under a brief read lock, writers build a fresh map and swap it.
/// Rule CRUD must call [`RuleEngine::refresh`] (or the server's invalidation
/// path) for changes to become visible; the engine never queries storage
/// during evaluation.
#[derive(Default)]
pub struct RuleEngine {
    cache: RwLock<Arc<RuleCache>>,
}

impl RuleEngine {
    /// Creates an engine with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rules currently cached.
    pub fn len(&self) -> usize {
        self.snapshot().values().map(Vec::len).sum()
    }

    /// Whether the cache holds no rules.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Replaces the cache from a list of enabled rules.
    ///
    /// An in-memory last-fired instant newer than the stored one is carried
    /// forward, so a refresh can never re-open a cooldown window that the
    /// engine already closed.
    pub fn install(&self, rules: Vec<CustomTriggerRule>) {
        let previous = self.snapshot();
        let mut by_id: HashMap<Uuid, Option<DateTime<Utc>>> = HashMap::new();
        for slots in previous.values() {
            for slot in slots {
                by_id.insert(slot.rule.id, slot.gate_value());
            }
        }

        let mut cache: RuleCache = HashMap::new();
        for rule in rules {
            let stored = rule.last_fired_utc;
            let carried = by_id.get(&rule.id).copied().flatten();
            let last_fired = match (stored, carried) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };

            let key = (rule.device_id.clone(), rule.metric.clone());
            cache.entry(key).or_default().push(Arc::new(RuleSlot {
                rule,
                last_fired: Mutex::new(last_fired),
            }));
        }

        match self.cache.write() {
            Ok(mut guard) => *guard = Arc::new(cache),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(cache),
        }
    }

    /// Reloads enabled rules from storage and swaps the cache.
    pub fn refresh(&self, conn: &Connection) -> Result<usize, RuleError> {
        let rules = crate::store::list_enabled_rules(conn)?;
        let count = rules.len();
        self.install(rules);
        Ok(count)
    }

    /// Evaluates all applicable rules against a reading at the current time.
    pub fn evaluate(
        &self,
        reading: &SensorReading,
        source_signal_event_id: Option<Uuid>,
    ) -> Vec<RuleFire> {
        self.evaluate_at(reading, source_signal_event_id, Utc::now())
    }

    /// Evaluates all applicable rules against a reading at an explicit time.
    ///
    /// For each rule matching `(reading.device_id, reading.metric)`:
    /// cooldown gate first, then the operator; on a hit the gate is stamped
    /// inside the same locked region and a [`RuleFire`] is returned.
    pub fn evaluate_at(
        &self,
        reading: &SensorReading,
        source_signal_event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Vec<RuleFire> {
        let snapshot = self.snapshot();
        let key = (reading.device_id.clone(), reading.metric.clone());
        let Some(slots) = snapshot.get(&key) else {
            return Vec::new();
        };

        let mut fires = Vec::new();
        for slot in slots {
            if let Some(fire) = slot.try_fire(reading, source_signal_event_id, now) {
                fires.push(fire);
            }
        }
        fires
    }

    fn snapshot(&self) -> Arc<RuleCache> {
        match self.cache.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

impl RuleSlot {
    fn gate_value(&self) -> Option<DateTime<Utc>> {
        match self.last_fired.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Cooldown check, operator evaluation, and gate update as one atomic
    /// region. Returns the firing when the rule passes both.
    fn try_fire(
        &self,
        reading: &SensorReading,
        source_signal_event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Option<RuleFire> {
        let rule = &self.rule;

        let mut gate = match self.last_fired.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let (Some(cooldown), Some(last)) = (rule.cooldown_seconds, *gate) {
            if now.signed_duration_since(last) < Duration::seconds(cooldown) {
                tracing::debug!(
                    rule_id = %rule.id,
                    device_id = %reading.device_id,
                    metric = %reading.metric,
                    "rule in cooldown, skipping"
                );
                return None;
            }
        }

        if !condition_met(rule.operator, reading.value, rule.threshold, rule.threshold2) {
            return None;
        }

        *gate = Some(now);
        drop(gate);

        let trigger = TriggerEvent {
            id: Uuid::new_v4(),
            device_id: reading.device_id.clone(),
            trigger_type: rule.trigger_type.clone(),
            timestamp_utc: now,
            source_signal_event_id,
        };

        let log = CustomTriggerLog {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            fired_utc: now,
            device_id: reading.device_id.clone(),
            metric: reading.metric.clone(),
            value: reading.value,
            condition: condition_text(rule.operator, reading.value, rule.threshold, rule.threshold2),
            generated_trigger_event_id: Some(trigger.id),
        };

        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            device_id = %reading.device_id,
            condition = %log.condition,
            "custom trigger rule fired"
        );

        Some(RuleFire {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            trigger,
            log,
        })
    }
}
