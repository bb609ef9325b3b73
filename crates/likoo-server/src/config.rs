//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
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

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connection token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Real-time core tuning.
    #[serde(default)]
    pub realtime: RealtimeConfig,
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

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "likoo_realtime=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Connection token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret shared with the auth service. A random one is generated at
    /// startup when unset, so issued tokens do not survive a restart.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Lifetime of tokens issued by `/api/auth/ws-token`.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Refuse WebSocket connections that carry no token.
    #[serde(default = "default_require_token")]
    pub require_token: bool,
}

/// Real-time core configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Frames buffered per session before new ones are dropped.
    #[serde(default = "default_session_buffer")]
    pub session_buffer: usize,

    /// Upper bound on a single persistence call, in milliseconds.
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,

    /// Mark users offline when their last connection closes.
    #[serde(default = "default_offline_on_last_disconnect")]
    pub offline_on_last_disconnect: bool,
}

impl RealtimeConfig {
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "likoo.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_require_token() -> bool {
    true
}

fn default_session_buffer() -> usize {
    256
}

fn default_persist_timeout_ms() -> u64 {
    5000
}

fn default_offline_on_last_disconnect() -> bool {
    true
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

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
            require_token: default_require_token(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            session_buffer: default_session_buffer(),
            persist_timeout_ms: default_persist_timeout_ms(),
            offline_on_last_disconnect: default_offline_on_last_disconnect(),
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
/// - `LIKOO_HOST` overrides `server.host`
/// - `LIKOO_PORT` (or `PORT`) overrides `server.port`
/// - `LIKOO_DB_PATH` overrides `database.path`
/// - `LIKOO_LOG_LEVEL` overrides `logging.level`
/// - `LIKOO_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `LIKOO_TOKEN_SECRET` overrides `auth.token_secret`
/// - `LIKOO_REQUIRE_TOKEN` overrides `auth.require_token`
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

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("LIKOO_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    // LIKOO_PORT wins over the generic PORT used by hosting platforms.
    if let Some(port) = var("LIKOO_PORT").or_else(|| var("PORT")) {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("LIKOO_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("LIKOO_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("LIKOO_LOG_JSON") {
        config.logging.json = is_truthy(&json);
    }
    if let Some(secret) = var("LIKOO_TOKEN_SECRET") {
        if !secret.is_empty() {
            config.auth.token_secret = Some(secret);
        }
    }
    if let Some(required) = var("LIKOO_REQUIRE_TOKEN") {
        config.auth.require_token = is_truthy(&required);
    }
}

fn is_truthy(value: &str) -> bool {
    value == "true" || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.database.path, "likoo.db");
        assert_eq!(config.database.pool_max_size, 8);
        assert!(config.auth.require_token);
        assert_eq!(config.realtime.session_buffer, 256);
        assert_eq!(config.realtime.persist_timeout(), Duration::from_secs(5));
        assert!(config.realtime.offline_on_last_disconnect);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [realtime]
            session_buffer = 32
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.realtime.session_buffer, 32);
        assert_eq!(config.realtime.persist_timeout_ms, 5000);
        assert_eq!(config.auth.token_ttl_secs, 3600);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config(path.to_str()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("LIKOO_HOST", "0.0.0.0"),
                ("PORT", "9000"),
                ("LIKOO_DB_PATH", "/tmp/likoo.db"),
                ("LIKOO_LOG_JSON", "1"),
                ("LIKOO_TOKEN_SECRET", "s3cret"),
                ("LIKOO_REQUIRE_TOKEN", "false"),
            ]),
        );
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path, "/tmp/likoo.db");
        assert!(config.logging.json);
        assert_eq!(config.auth.token_secret.as_deref(), Some("s3cret"));
        assert!(!config.auth.require_token);
    }

    #[test]
    fn likoo_port_beats_generic_port() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("PORT", "9000"), ("LIKOO_PORT", "7000")]));
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn unparsable_overrides_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[("LIKOO_HOST", "not-an-ip"), ("LIKOO_PORT", "http")]),
        );
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
