//! Custom trigger rule storage and evaluation for the Hearth hub.
//!
//! Implements rule CRUD, the append-only firing audit log, and the
//! [`RuleEngine`] that evaluates enabled rules against incoming readings.
//! The engine keeps a snapshot-swapped in-memory cache keyed by
//! `(device_id, metric)` so evaluation never touches storage; rule mutations
//! and a periodic background task refresh the cache.
//!
//! Cooldown is enforced by a per-rule mutex around the check-and-set of the
//! last-fired instant, so two readings for the same rule arriving
//! concurrently can never both pass the gate.

mod engine;
mod store;

pub use engine::{condition_met, condition_text, RuleEngine, RuleFire};
pub use store::{
    append_log, create_rule, delete_rule, get_rule, list_enabled_rules, list_rules,
    logs_for_rule, set_last_fired, update_rule, CreateRuleParams, UpdateRuleParams,
};

use thiserror::Error;

/// Errors that can occur during rule operations.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("rule not found: {0}")]
    NotFound(uuid::Uuid),
}
