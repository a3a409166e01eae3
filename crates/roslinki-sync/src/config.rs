//! # Gateway Configuration
//!
//! Configuration management for the gateway process.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HTTP_PORT=8080                                                     │
//! │     MQTT_BROKER_URL=mqtts://broker.local:8883                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $ROSLINKI_CONFIG, or                                               │
//! │     ~/.config/roslinki-gateway/gateway.toml (Linux)                    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [http]
//! port = 8080
//!
//! [mqtt]
//! broker_url = "mqtts://broker.local:8883"
//! username = "gateway"
//! password = "secret"
//! tls_insecure = false
//! topic_prefix = "roslinki"
//!
//! [broadcast]
//! interval_secs = 60
//!
//! [database]
//! path = "/var/lib/roslinki/gateway.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult, TransportError};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ROSLINKI_CONFIG";

// =============================================================================
// HTTP Settings
// =============================================================================

/// Operator-facing HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            bind_addr: default_bind_addr(),
            port: default_http_port(),
        }
    }
}

impl HttpSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// MQTT Settings
// =============================================================================

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSettings {
    /// `mqtt://`, `tcp://` (plain) or `mqtts://`, `ssl://` (TLS).
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Skip broker certificate verification. Development brokers only.
    #[serde(default)]
    pub tls_insecure: bool,

    /// Prefix of every topic (`<prefix>/sensor_logs`, `<prefix>/config`, ...).
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Upper bound for a single config publish.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,

    /// Initial reconnect backoff (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum reconnect backoff (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_client_id() -> String {
    format!("roslinki-gateway-{}", Uuid::new_v4())
}

fn default_topic_prefix() -> String {
    "roslinki".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_publish_timeout() -> u64 {
    5
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    60
}

impl Default for MqttSettings {
    fn default() -> Self {
        MqttSettings {
            broker_url: default_broker_url(),
            client_id: default_client_id(),
            username: None,
            password: None,
            tls_insecure: false,
            topic_prefix: default_topic_prefix(),
            keep_alive_secs: default_keep_alive(),
            publish_timeout_secs: default_publish_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

/// Host, port and TLS choice parsed from the broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl MqttSettings {
    /// Parses `broker_url`.
    ///
    /// ## Example
    /// ```rust
    /// use roslinki_sync::config::MqttSettings;
    ///
    /// let settings = MqttSettings {
    ///     broker_url: "ssl://broker.local".into(),
    ///     ..Default::default()
    /// };
    /// let endpoint = settings.endpoint().unwrap();
    /// assert_eq!(endpoint.port, 8883);
    /// assert!(endpoint.tls);
    /// ```
    pub fn endpoint(&self) -> SyncResult<BrokerEndpoint> {
        let url = Url::parse(&self.broker_url)?;

        let (tls, default_port) = match url.scheme() {
            "mqtt" | "tcp" => (false, 1883),
            "mqtts" | "ssl" => (true, 8883),
            other => {
                return Err(TransportError::InvalidBrokerUrl(format!(
                    "unsupported scheme '{}', expected mqtt://, mqtts://, tcp:// or ssl://",
                    other
                ))
                .into())
            }
        };

        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(|| {
            TransportError::InvalidBrokerUrl(format!("missing host in {}", self.broker_url))
        })?;

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port: url.port().unwrap_or(default_port),
            tls,
        })
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Broadcast Settings
// =============================================================================

/// Longest accepted broadcast period: one day.
pub const MAX_BROADCAST_INTERVAL: Duration = Duration::from_secs(86_400);

/// Periodic re-announce of the retained config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastSettings {
    /// Seconds between announces, independent of operator saves.
    #[serde(default = "default_broadcast_interval")]
    pub interval_secs: u64,
}

fn default_broadcast_interval() -> u64 {
    60
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        BroadcastSettings {
            interval_secs: default_broadcast_interval(),
        }
    }
}

impl BroadcastSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "roslinki", "gateway")
        .map(|dirs| dirs.data_dir().join("gateway.db"))
        .unwrap_or_else(|| PathBuf::from("gateway.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Gateway Configuration
// =============================================================================

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub mqtt: MqttSettings,

    #[serde(default)]
    pub broadcast: BroadcastSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl GatewayConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`gateway.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading gateway config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.http.port == 0 {
            return Err(SyncError::Config("http.port must be greater than 0".into()));
        }

        self.mqtt.endpoint()?;

        if self.mqtt.client_id.trim().is_empty() {
            return Err(SyncError::Config("mqtt.client_id must not be empty".into()));
        }

        let prefix = &self.mqtt.topic_prefix;
        if prefix.is_empty() || prefix.contains(['#', '+']) || prefix.ends_with('/') {
            return Err(SyncError::Config(format!(
                "mqtt.topic_prefix must be a non-empty topic without wildcards \
                 or trailing '/', got '{}'",
                prefix
            )));
        }

        if self.mqtt.publish_timeout_secs == 0 {
            return Err(SyncError::Config(
                "mqtt.publish_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.broadcast.interval_secs == 0 {
            return Err(SyncError::Config(
                "broadcast.interval_secs must be greater than 0".into(),
            ));
        }

        if self.broadcast.interval() > MAX_BROADCAST_INTERVAL {
            return Err(SyncError::Config(format!(
                "broadcast.interval_secs must be at most {}, got {}",
                MAX_BROADCAST_INTERVAL.as_secs(),
                self.broadcast.interval_secs
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) -> SyncResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    ///
    /// Empty values are ignored. Values that fail to parse are errors.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> SyncResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(port) = get("HTTP_PORT") {
            self.http.port = parse_env("HTTP_PORT", &port)?;
            debug!(port = self.http.port, "Overriding HTTP port from environment");
        }

        if let Some(url) = get("MQTT_BROKER_URL") {
            debug!(url = %url, "Overriding broker URL from environment");
            self.mqtt.broker_url = url;
        }

        if let Some(id) = get("MQTT_CLIENT_ID") {
            self.mqtt.client_id = id;
        }

        if let Some(username) = get("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }

        if let Some(password) = get("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }

        if let Some(insecure) = get("MQTT_TLS_INSECURE") {
            self.mqtt.tls_insecure = parse_bool("MQTT_TLS_INSECURE", &insecure)?;
        }

        if let Some(prefix) = get("MQTT_TOPIC_PREFIX") {
            self.mqtt.topic_prefix = prefix;
        }

        if let Some(interval) = get("BROADCAST_INTERVAL_SEC") {
            self.broadcast.interval_secs = parse_env("BROADCAST_INTERVAL_SEC", &interval)?;
        }

        if let Some(path) = get("DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        Ok(())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "roslinki", "gateway")
            .map(|dirs| dirs.config_dir().join("gateway.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> SyncResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> SyncResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(SyncError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
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
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.mqtt.topic_prefix, "roslinki");
        assert_eq!(config.broadcast.interval_secs, 60);
        assert_eq!(config.mqtt.publish_timeout(), Duration::from_secs(5));
        assert!(config.mqtt.client_id.starts_with("roslinki-gateway-"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GatewayConfig::from_toml(
            r#"
            [mqtt]
            broker_url = "mqtts://broker.local"
            tls_insecure = true

            [broadcast]
            interval_secs = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 8080);
        assert!(config.mqtt.tls_insecure);
        assert_eq!(config.broadcast.interval_secs, 15);
        assert_eq!(
            config.mqtt.endpoint().unwrap(),
            BrokerEndpoint {
                host: "broker.local".into(),
                port: 8883,
                tls: true
            }
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(env(&[
                ("HTTP_PORT", "9090"),
                ("MQTT_BROKER_URL", "tcp://10.0.0.2:1884"),
                ("MQTT_CLIENT_ID", "gw-1"),
                ("MQTT_USERNAME", "gateway"),
                ("MQTT_PASSWORD", "secret"),
                ("MQTT_TLS_INSECURE", "true"),
                ("BROADCAST_INTERVAL_SEC", "30"),
                ("DB_PATH", "/tmp/roslinki.db"),
                ("MQTT_TOPIC_PREFIX", "farm/north"),
            ]))
            .unwrap();

        assert_eq!(config.http.port, 9090);
        assert_eq!(config.mqtt.client_id, "gw-1");
        assert_eq!(config.mqtt.username.as_deref(), Some("gateway"));
        assert_eq!(config.mqtt.password.as_deref(), Some("secret"));
        assert!(config.mqtt.tls_insecure);
        assert_eq!(config.broadcast.interval(), Duration::from_secs(30));
        assert_eq!(config.database.path, PathBuf::from("/tmp/roslinki.db"));
        assert_eq!(config.mqtt.topic_prefix, "farm/north");

        let endpoint = config.mqtt.endpoint().unwrap();
        assert_eq!(endpoint.host, "10.0.0.2");
        assert_eq!(endpoint.port, 1884);
        assert!(!endpoint.tls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(env(&[("HTTP_PORT", ""), ("MQTT_TLS_INSECURE", "")]))
            .unwrap();
        assert_eq!(config.http.port, 8080);
        assert!(!config.mqtt.tls_insecure);
    }

    #[test]
    fn test_bad_env_values_are_rejected() {
        let mut config = GatewayConfig::default();
        assert!(config
            .apply_overrides(env(&[("BROADCAST_INTERVAL_SEC", "soon")]))
            .is_err());
        assert!(config
            .apply_overrides(env(&[("MQTT_TLS_INSECURE", "maybe")]))
            .is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GatewayConfig::default();

        config.broadcast.interval_secs = 0;
        assert!(config.validate().is_err());
        config.broadcast.interval_secs = 60;

        config.mqtt.broker_url = "http://broker".into();
        assert!(config.validate().is_err());
        config.mqtt.broker_url = "mqtt://broker".into();

        config.mqtt.topic_prefix = "roslinki/#".into();
        assert!(config.validate().is_err());
        config.mqtt.topic_prefix = String::new();
        assert!(config.validate().is_err());
        config.mqtt.topic_prefix = "roslinki".into();

        config.http.port = 0;
        assert!(config.validate().is_err());
        config.http.port = 8080;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_broadcast_interval_is_bounded() {
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(env(&[("BROADCAST_INTERVAL_SEC", "18446744073709551615")]))
            .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at most 86400"));

        config.broadcast.interval_secs = MAX_BROADCAST_INTERVAL.as_secs();
        assert!(config.validate().is_ok());
        config.broadcast.interval_secs += 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = GatewayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[http]"));
        assert!(toml_str.contains("[mqtt]"));

        let back = GatewayConfig::from_toml(&toml_str).unwrap();
        assert_eq!(back.mqtt.client_id, config.mqtt.client_id);
    }
}
