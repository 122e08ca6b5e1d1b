//! Session and scheduler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Simulated wallet handshake latency (ms). Default: 1,500.
    #[serde(default = "default_connect_latency_ms")]
    pub connect_latency_ms: u64,
    /// Maximum transactions per UTC day. Default: 50.
    #[serde(default = "default_transaction_cap")]
    pub transaction_cap: u32,
    /// Lifetime of a degraded-start decision (seconds). Default: 60.
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,
    /// Price history samples kept. Default: 24.
    #[serde(default = "default_history_points")]
    pub history_points: usize,
}

fn default_connect_latency_ms() -> u64 {
    1_500
}

fn default_transaction_cap() -> u32 {
    50
}

fn default_decision_timeout_secs() -> u64 {
    60
}

fn default_history_points() -> usize {
    24
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_latency_ms: default_connect_latency_ms(),
            transaction_cap: default_transaction_cap(),
            decision_timeout_secs: default_decision_timeout_secs(),
            history_points: default_history_points(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn connect_latency(&self) -> Duration {
        Duration::from_millis(self.connect_latency_ms)
    }

    #[must_use]
    pub fn decision_timeout(&self) -> chrono::Duration {
        // Clamped to a day so the conversion cannot overflow.
        chrono::Duration::seconds(self.decision_timeout_secs.min(86_400) as i64)
    }
}

/// Refresh periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Balance + health refresh period (seconds). Default: 30.
    #[serde(default = "default_short_interval_secs")]
    pub short_interval_secs: u64,
    /// Token balances + price history period (seconds). Default: 300.
    #[serde(default = "default_long_interval_secs")]
    pub long_interval_secs: u64,
}

fn default_short_interval_secs() -> u64 {
    30
}

fn default_long_interval_secs() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            short_interval_secs: default_short_interval_secs(),
            long_interval_secs: default_long_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn short_interval(&self) -> Duration {
        Duration::from_secs(self.short_interval_secs.max(1))
    }

    #[must_use]
    pub fn long_interval(&self) -> Duration {
        Duration::from_secs(self.long_interval_secs.max(1))
    }
}
