//! Background tasks for the Hearth server.
//!
//! Includes:
//! - Periodic rule cache refresh, so external changes to the rule store
//!   become visible even without a CRUD invalidation.

use crate::AppState;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the periodic rule cache refresh task.
///
/// This task runs indefinitely. Rule CRUD through the API refreshes the
/// cache immediately; this loop is the backstop that bounds staleness for
/// any other writer of the rule store.
pub async fn start_rule_refresh_task(state: Arc<AppState>, interval_seconds: u64) {
    if interval_seconds == 0 {
        tracing::warn!("rule refresh task disabled (interval=0)");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(interval_seconds, "starting rule cache refresh task");

    loop {
        sleep(interval).await;

        let state_clone = state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = state_clone.pool.get().map_err(|e| e.to_string())?;
            state_clone.rules.refresh(&conn).map_err(|e| e.to_string())
        })
        .await;

        match result {
            Ok(Ok(count)) => {
                tracing::debug!(count, "refreshed rule cache");
            }
            Ok(Err(e)) => {
                tracing::error!("failed to refresh rule cache: {}", e);
            }
            Err(e) => {
                tracing::error!("rule refresh task join error: {}", e);
            }
        }
    }
}
