//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use wbot_session::{SchedulerConfig, SessionConfig};

/// One dependency probed with an HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
}

/// Dependency health configuration.
///
/// With `status_url` set, health comes from the remote status endpoint and
/// `dependency_names` seeds the names reported when it cannot be reached.
/// Otherwise every entry in `endpoints` is probed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Per-probe timeout (ms). Default: 5,000.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub dependency_names: Vec<String>,
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            endpoints: Vec::new(),
            status_url: None,
            dependency_names: Vec::new(),
        }
    }
}

impl HealthConfig {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Fixed quote served as live data when no chain source is wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticQuoteConfig {
    pub sol: Decimal,
    pub token_balance: Decimal,
    pub sol_usd: Decimal,
    pub token_usd: Decimal,
}

/// Balance source configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Live quote; without it live refreshes report the source as unavailable.
    #[serde(default)]
    pub static_quote: Option<StaticQuoteConfig>,
    /// Seed for the simulated source (random when unset).
    #[serde(default)]
    pub simulation_seed: Option<u64>,
}

/// Session slot persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Slot file path. Default: ./data/session.json
    #[serde(default = "default_persistence_path")]
    pub path: String,
    /// Delay between a change and its write (ms). Default: 250.
    #[serde(default = "default_flush_debounce_ms")]
    pub flush_debounce_ms: u64,
}

fn default_persistence_path() -> String {
    "./data/session.json".to_string()
}

fn default_flush_debounce_ms() -> u64 {
    250
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_persistence_path(),
            flush_debounce_ms: default_flush_debounce_ms(),
        }
    }
}

impl PersistenceConfig {
    #[must_use]
    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush_debounce_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when RUST_LOG is unset (e.g. "info,wbot=debug").
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Load `path`, or defaults when the file does not exist.
    /// The flag tells whether the file was found.
    pub fn from_file_or_default(path: &str) -> AppResult<(Self, bool)> {
        if Path::new(path).exists() {
            Ok((Self::from_file(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.session.decision_timeout_secs == 0 {
            return Err(AppError::Config(
                "session.decision_timeout_secs must be positive".to_string(),
            ));
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(AppError::Config(
                "health.probe_timeout_ms must be positive".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for endpoint in &self.health.endpoints {
            if endpoint.name.trim().is_empty() {
                return Err(AppError::Config("health endpoint with empty name".to_string()));
            }
            if !names.insert(endpoint.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate health endpoint: {}",
                    endpoint.name
                )));
            }
        }
        if self.persistence.path.trim().is_empty() {
            return Err(AppError::Config("persistence.path is empty".to_string()));
        }
        Ok(())
    }
}
