//! Hearth server binary — the main entry point for the Hearth hub.
//!
//! Starts the axum HTTP server with structured logging, database
//! initialization, the ingestion worker, and graceful shutdown on
//! SIGTERM/SIGINT.

use hearth_server::config;
use hearth_server::ingest;
use hearth_server::webhook::WebhookNotifier;
use hearth_server::AppState;
use hearth_signal::DeviceRegistry;
use hearth_types::DeviceKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("HEARTH_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Seeds the device registry from the config's `[devices]` table.
fn seed_registry(devices: &std::collections::HashMap<String, String>) -> DeviceRegistry {
    let registry = DeviceRegistry::new();
    for (device_id, label) in devices {
        match label.parse::<DeviceKind>() {
            Ok(kind) => registry.insert(device_id, kind),
            Err(e) => {
                tracing::warn!(device_id = %device_id, "ignoring device registration: {}", e);
            }
        }
    }
    registry
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = hearth_db::create_pool(
        &config.database.path,
        hearth_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied = hearth_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Build shared state
    let registry = Arc::new(seed_registry(&config.devices));
    if !registry.is_empty() {
        tracing::info!(count = registry.len(), "seeded device registry");
    }

    let rules = Arc::new(hearth_rules::RuleEngine::new());
    {
        let conn = pool
            .get()
            .expect("failed to get database connection for rule cache");
        let count = rules
            .refresh(&conn)
            .expect("failed to load custom trigger rules");
        tracing::info!(count, "loaded enabled custom trigger rules");
    }

    let webhook = Arc::new(WebhookNotifier::from_config(&config.webhook));
    if webhook.is_configured() {
        tracing::info!("webhook push enabled");
    }

    let (ingest_tx, ingest_rx) = ingest::ingest_channel(config.broker.queue_capacity);

    let state = AppState {
        pool,
        registry,
        rules,
        broadcaster: Arc::new(hearth_broadcast::Broadcaster::new()),
        webhook,
        ingest_tx,
    };

    // Start the ingestion worker and background tasks
    let worker_state = Arc::new(state.clone());
    tokio::spawn(ingest::run_ingest_worker(worker_state.clone(), ingest_rx));
    tokio::spawn(hearth_server::background::start_rule_refresh_task(
        worker_state,
        config.rules.refresh_seconds,
    ));

    // Build application
    let app = hearth_server::app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting hearth server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("hearth server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
