//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `adpilot.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use adpilot_domain::error::ValidationError;
use adpilot_domain::rule::TrustSettings;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Rule engine and scheduler settings.
    pub engine: EngineConfig,
    /// Account-level trust gate thresholds.
    pub trust: TrustConfig,
    /// Platform adapter toggles.
    pub platform: PlatformConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between two scheduler ticks.
    pub poll_interval_secs: u64,
    /// Upper bound of a single action call.
    pub action_timeout_secs: u64,
    /// Extra attempts for metric and signal health reads.
    pub read_retries: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Default healthy threshold for new rules.
    pub min_signal_health: f64,
    /// Scores below this block; between it and the healthy bound hold.
    pub degraded_threshold: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Seed the simulated platform with demo campaigns.
    pub virtual_enabled: bool,
}

impl Config {
    /// Load configuration from `adpilot.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("adpilot.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ADPILOT_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("ADPILOT_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("ADPILOT_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("ADPILOT_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("ADPILOT_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.engine.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.engine.action_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "action_timeout_secs must be non-zero".to_string(),
            ));
        }
        self.trust_settings()?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Account-level trust thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Trust`] when a bound is outside 0–100 or the
    /// degraded bound exceeds the healthy one.
    pub fn trust_settings(&self) -> Result<TrustSettings, ConfigError> {
        Ok(TrustSettings::new(
            self.trust.min_signal_health,
            self.trust.degraded_threshold,
        )?)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.engine.poll_interval_secs)
    }

    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.action_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:adpilot.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "adpilotd=info,adpilot=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            action_timeout_secs: 30,
            read_retries: 2,
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            min_signal_health: TrustSettings::DEFAULT_MIN_SIGNAL_HEALTH,
            degraded_threshold: TrustSettings::DEFAULT_DEGRADED_THRESHOLD,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// Inconsistent trust thresholds.
    #[error("invalid trust settings")]
    Trust(#[from] ValidationError),
}
