//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Broker intake settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Webhook push settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Rule engine settings.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static device-id → kind registrations (`"frontroom/button1" = "BUTTON"`).
    #[serde(default)]
    pub devices: HashMap<String, String>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Broker intake configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Bounded capacity of the ingest queue; messages past it are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Webhook push configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Primary endpoint for trigger pushes. Unset disables the push.
    #[serde(default)]
    pub url: Option<String>,

    /// Secondary test endpoint, pushed in addition to the primary.
    #[serde(default)]
    pub test_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_webhook_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Rule engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Interval between background rule cache refreshes, in seconds.
    /// `0` disables the periodic refresh (CRUD invalidation still applies).
    #[serde(default = "default_rules_refresh_seconds")]
    pub refresh_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "hearth_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "hearth.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_queue_capacity() -> usize {
    1_024
}

fn default_webhook_timeout_seconds() -> u64 {
    10
}

fn default_rules_refresh_seconds() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            refresh_seconds: default_rules_refresh_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `HEARTH_HOST` overrides `server.host`
/// - `HEARTH_PORT` overrides `server.port`
/// - `HEARTH_DB_PATH` overrides `database.path`
/// - `HEARTH_WEBHOOK_URL` overrides `webhook.url`
/// - `HEARTH_WEBHOOK_TEST_URL` overrides `webhook.test_url`
/// - `HEARTH_RULES_REFRESH_SECONDS` overrides `rules.refresh_seconds`
/// - `HEARTH_LOG_LEVEL` overrides `logging.level`
/// - `HEARTH_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("HEARTH_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("HEARTH_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("HEARTH_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(url) = std::env::var("HEARTH_WEBHOOK_URL") {
        config.webhook.url = Some(url);
    }
    if let Ok(url) = std::env::var("HEARTH_WEBHOOK_TEST_URL") {
        config.webhook.test_url = Some(url);
    }
    if let Ok(seconds) = std::env::var("HEARTH_RULES_REFRESH_SECONDS") {
        if let Ok(parsed) = seconds.parse() {
            config.rules.refresh_seconds = parsed;
        }
    }
    if let Ok(level) = std::env::var("HEARTH_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("HEARTH_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_file() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, "hearth.db");
        assert_eq!(config.broker.queue_capacity, 1_024);
        assert_eq!(config.rules.refresh_seconds, 60);
        assert!(config.webhook.url.is_none());
        assert!(config.devices.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            load_config(Some("/nonexistent/hearth.toml")).expect("missing file should fall back");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn file_values_are_parsed() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
[server]
port = 8080

[database]
path = "/tmp/test-hearth.db"

[webhook]
url = "http://automation.local/hook"
timeout_seconds = 3

[rules]
refresh_seconds = 15

[devices]
"frontroom/button1" = "BUTTON"
"#
        )
        .expect("write config");

        let config = load_config(file.path().to_str()).expect("config should parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "/tmp/test-hearth.db");
        assert_eq!(
            config.webhook.url.as_deref(),
            Some("http://automation.local/hook")
        );
        assert_eq!(config.webhook.timeout_seconds, 3);
        assert_eq!(config.rules.refresh_seconds, 15);
        assert_eq!(
            config.devices.get("frontroom/button1").map(String::as_str),
            Some("BUTTON")
        );
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not valid toml [[[").expect("write config");

        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
