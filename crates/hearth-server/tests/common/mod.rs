//! Shared helpers for hearth-server integration tests.

#![allow(dead_code)]

use hearth_broadcast::Broadcaster;
use hearth_rules::RuleEngine;
use hearth_server::config::WebhookConfig;
use hearth_server::ingest::{ingest_channel, BrokerMessage};
use hearth_server::webhook::WebhookNotifier;
use hearth_server::AppState;
use hearth_signal::DeviceRegistry;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// A test server state backed by a file database in a temp dir.
///
/// The temp dir must be kept alive for the duration of the test.
pub struct TestContext {
    pub state: AppState,
    pub ingest_rx: mpsc::Receiver<BrokerMessage>,
    _dir: TempDir,
}

pub fn test_context() -> TestContext {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let db_path = dir.path().join("hearth-test.db");

    let pool = hearth_db::create_pool(
        db_path.to_str().expect("utf-8 path"),
        hearth_db::DbRuntimeSettings::default(),
    )
    .expect("should create pool");

    {
        let conn = pool.get().expect("should get connection");
        hearth_db::run_migrations(&conn).expect("migrations should succeed");
    }

    let (ingest_tx, ingest_rx) = ingest_channel(64);

    let state = AppState {
        pool,
        registry: Arc::new(DeviceRegistry::new()),
        rules: Arc::new(RuleEngine::new()),
        broadcaster: Arc::new(Broadcaster::new()),
        webhook: Arc::new(WebhookNotifier::from_config(&WebhookConfig::default())),
        ingest_tx,
    };

    TestContext {
        state,
        ingest_rx,
        _dir: dir,
    }
}

/// Spawns the ingest worker over the context's receiving half.
pub fn spawn_worker(ctx: &mut TestContext) {
    let (_, placeholder_rx) = ingest_channel(1);
    let rx = std::mem::replace(&mut ctx.ingest_rx, placeholder_rx);
    let state = Arc::new(ctx.state.clone());
    tokio::spawn(hearth_server::ingest::run_ingest_worker(state, rx));
}

/// Sends one broker message through the ingest queue.
pub async fn send_message(ctx: &TestContext, topic: &str, payload: &str) {
    ctx.state
        .ingest_tx
        .send(BrokerMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        })
        .await
        .expect("ingest queue should accept message");
}
