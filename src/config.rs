//! Configuration management for sqlsession.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::cleanup::DEFAULT_CLEANUP_INTERVAL;
use crate::cli::Args;
use crate::codec::{KeyPair, DEFAULT_MAX_AGE};
use crate::session::CookieOptions;
use crate::store::{StoreOptions, DEFAULT_TABLE, MAX_SESSION_AGE};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the session cookie used by the server.
    pub session_name: String,
    /// Session store configuration.
    pub store: StoreSection,
    /// Background cleanup configuration.
    pub cleanup: CleanupSection,
    /// Server configuration.
    pub server: ServerSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_name: "session".to_string(),
            store: StoreSection::default(),
            cleanup: CleanupSection::default(),
            server: ServerSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// Session store configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// SQLite connection URL.
    pub database_url: String,
    /// Session table name.
    pub table: String,
    /// Cookie path.
    pub cookie_path: String,
    /// Cookie domain; host-only when unset.
    pub cookie_domain: Option<String>,
    /// Session lifetime in seconds, for both cookie and row.
    pub max_age: i64,
    /// Mark cookies `Secure`.
    pub secure: bool,
    /// Mark cookies `HttpOnly`.
    pub http_only: bool,
    /// Codec keys, primary first. Older keys keep decoding existing cookies.
    pub keys: Vec<KeySection>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database_url: "sqlite://sessions.db".to_string(),
            table: DEFAULT_TABLE.to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: true,
            keys: Vec::new(),
        }
    }
}

/// One configured key pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySection {
    /// HMAC key.
    pub hash_key: String,
    /// AES key, 16 or 32 bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_key: Option<String>,
}

impl KeySection {
    fn to_key_pair(&self) -> KeyPair {
        KeyPair {
            hash_key: self.hash_key.as_bytes().to_vec(),
            block_key: self.block_key.as_ref().map(|k| k.as_bytes().to_vec()),
        }
    }
}

/// Background cleanup configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSection {
    /// Seconds between sweeps; 0 selects the default.
    pub interval_secs: u64,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_CLEANUP_INTERVAL.as_secs(),
        }
    }
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("SQLSESSION_DATABASE_URL") {
            self.store.database_url = url;
        }

        if let Some(table) = var("SQLSESSION_TABLE") {
            self.store.table = table;
        }

        if let Some(max_age) = var("SQLSESSION_MAX_AGE").and_then(|v| v.parse().ok()) {
            self.store.max_age = max_age;
        }

        if let Some(hash_key) = var("SQLSESSION_HASH_KEY").filter(|k| !k.is_empty()) {
            self.set_primary_key(hash_key, var("SQLSESSION_BLOCK_KEY"));
        }

        if let Some(secs) = var("SQLSESSION_CLEANUP_INTERVAL").and_then(|v| v.parse().ok()) {
            self.cleanup.interval_secs = secs;
        }

        if let Some(host) = var("SQLSESSION_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("SQLSESSION_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(level) = var("SQLSESSION_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref url) = args.database {
            self.store.database_url = url.clone();
        }

        if let Some(ref table) = args.table {
            self.store.table = table.clone();
        }

        if let Some(max_age) = args.max_age {
            self.store.max_age = max_age;
        }

        if let Some(secs) = args.cleanup_interval {
            self.cleanup.interval_secs = secs;
        }

        if let Some(ref key) = args.hash_key {
            self.set_primary_key(key.clone(), args.block_key.clone());
        }

        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Make `hash_key` the primary key, keeping the others for decoding.
    fn set_primary_key(&mut self, hash_key: String, block_key: Option<String>) {
        let key = KeySection {
            hash_key,
            block_key: block_key.filter(|k| !k.is_empty()),
        };
        self.store.keys.retain(|k| *k != key);
        self.store.keys.insert(0, key);
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Validate the store section and convert it to [`StoreOptions`].
    pub fn store_options(&self) -> Result<StoreOptions, ConfigError> {
        if !(-MAX_SESSION_AGE..=MAX_SESSION_AGE).contains(&self.store.max_age) {
            return Err(ConfigError::InvalidMaxAge(self.store.max_age));
        }

        if self.store.keys.is_empty() {
            return Err(ConfigError::NoKeys);
        }

        for key in &self.store.keys {
            if key.hash_key.is_empty() {
                return Err(ConfigError::EmptyHashKey);
            }
            if let Some(ref block) = key.block_key {
                if !matches!(block.len(), 16 | 32) {
                    return Err(ConfigError::InvalidBlockKey(block.len()));
                }
            }
        }

        Ok(StoreOptions {
            table: self.store.table.clone(),
            cookie: CookieOptions {
                path: self.store.cookie_path.clone(),
                domain: self.store.cookie_domain.clone(),
                max_age: self.store.max_age,
                secure: self.store.secure,
                http_only: self.store.http_only,
            },
            key_pairs: self.store.keys.iter().map(KeySection::to_key_pair).collect(),
        })
    }

    /// Interval between background sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup.interval_secs)
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        Ok(ServerConfig::new(host.to_string(), self.server.port))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Session lifetime beyond what the store can represent.
    InvalidMaxAge(i64),
    /// No codec key configured.
    NoKeys,
    /// A configured hash key is empty.
    EmptyHashKey,
    /// A block key is neither 16 nor 32 bytes long.
    InvalidBlockKey(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidMaxAge(age) => write!(
                f,
                "max age must be within {} seconds either way, got {}",
                MAX_SESSION_AGE, age
            ),
            Self::NoKeys => write!(
                f,
                "no session key configured (use --hash-key or SQLSESSION_HASH_KEY)"
            ),
            Self::EmptyHashKey => write!(f, "hash key must not be empty"),
            Self::InvalidBlockKey(len) => {
                write!(f, "block key must be 16 or 32 bytes, got {}", len)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn with_key(hash_key: &str) -> Config {
        let mut config = Config::default();
        config.store.keys.push(KeySection {
            hash_key: hash_key.to_string(),
            block_key: None,
        });
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session_name, "session");
        assert_eq!(config.store.table, "sessions");
        assert_eq!(config.store.max_age, 86400 * 30);
        assert!(config.store.http_only);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "session_name": "sid",
            "store": {
                "database_url": "sqlite:///var/lib/app/sessions.db",
                "table": "web_sessions",
                "max_age": 3600,
                "secure": true,
                "keys": [
                    { "hash_key": "new-key", "block_key": "0123456789abcdef" },
                    { "hash_key": "old-key" }
                ]
            },
            "cleanup": { "interval_secs": 60 }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.session_name, "sid");
        assert_eq!(config.store.table, "web_sessions");
        assert_eq!(config.store.max_age, 3600);
        assert!(config.store.secure);
        assert_eq!(config.store.keys.len(), 2);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(60));
        // Untouched sections keep their defaults.
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.store.cookie_path, "/");
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_apply_vars() {
        let vars: HashMap<&str, &str> = [
            ("SQLSESSION_TABLE", "env_sessions"),
            ("SQLSESSION_MAX_AGE", "120"),
            ("SQLSESSION_HASH_KEY", "env-key"),
            ("SQLSESSION_CLEANUP_INTERVAL", "not-a-number"),
            ("RUST_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = with_key("file-key");
        config.apply_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.store.table, "env_sessions");
        assert_eq!(config.store.max_age, 120);
        assert_eq!(config.store.keys[0].hash_key, "env-key");
        assert_eq!(config.store.keys[1].hash_key, "file-key");
        // Unparsable values are ignored.
        assert_eq!(config.cleanup.interval_secs, 300);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_apply_args() {
        let mut config = with_key("file-key");
        let args = Args {
            database: Some("sqlite://other.db".to_string()),
            max_age: Some(60),
            cleanup_interval: Some(0),
            hash_key: Some("cli-key".to_string()),
            host: Some("192.168.1.1".parse().unwrap()),
            port: Some(5000),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.store.database_url, "sqlite://other.db");
        assert_eq!(config.store.max_age, 60);
        assert_eq!(config.cleanup.interval_secs, 0);
        assert_eq!(config.store.keys[0].hash_key, "cli-key");
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_apply_empty_args_keeps_values() {
        let mut config = with_key("file-key");
        config.server.port = 8080;
        config.apply_args(&Args::default());

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.keys.len(), 1);
    }

    #[test]
    fn test_primary_key_not_duplicated() {
        let mut config = with_key("a");
        config.store.keys.push(KeySection {
            hash_key: "b".to_string(),
            block_key: None,
        });
        config.set_primary_key("b".to_string(), None);

        let keys: Vec<_> = config.store.keys.iter().map(|k| k.hash_key.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_store_options() {
        let mut config = with_key("secret");
        config.store.cookie_domain = Some("example.com".to_string());
        config.store.max_age = 600;

        let options = config.store_options().unwrap();
        assert_eq!(options.table, "sessions");
        assert_eq!(options.cookie.max_age, 600);
        assert_eq!(options.cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(options.key_pairs, vec![KeyPair::signing(b"secret".to_vec())]);
    }

    #[test]
    fn test_store_options_requires_key() {
        assert!(matches!(
            Config::default().store_options(),
            Err(ConfigError::NoKeys)
        ));
    }

    #[test]
    fn test_store_options_rejects_huge_max_age() {
        let mut config = with_key("secret");
        config.store.max_age = 400_000_000_000;
        assert!(matches!(
            config.store_options(),
            Err(ConfigError::InvalidMaxAge(400_000_000_000))
        ));

        config.store.max_age = -MAX_SESSION_AGE - 1;
        assert!(config.store_options().is_err());

        config.store.max_age = MAX_SESSION_AGE;
        assert!(config.store_options().is_ok());
    }

    #[test]
    fn test_store_options_rejects_bad_block_key() {
        let mut config = Config::default();
        config.store.keys.push(KeySection {
            hash_key: "secret".to_string(),
            block_key: Some("short".to_string()),
        });
        assert!(matches!(
            config.store_options(),
            Err(ConfigError::InvalidBlockKey(5))
        ));
    }

    #[test]
    fn test_to_server_config() {
        let server_config = Config::default().to_server_config().unwrap();
        assert_eq!(server_config.host, "127.0.0.1");
        assert_eq!(server_config.port, 3000);
    }

    #[test]
    fn test_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not-an-ip".to_string();
        assert!(config.to_server_config().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = with_key("secret");
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"database_url\""));
        assert!(json.contains("\"interval_secs\""));
        assert!(!json.contains("\"block_key\""));
    }
}
