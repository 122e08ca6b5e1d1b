//! Prometheus metrics for the wallet bot session.
//!
//! Covers:
//! - Dependency health (per dependency and aggregate)
//! - Bot lifecycle, wallet connection and simulation mode
//! - Refresh failures and scheduler ticks
//! - Degraded-start decisions and the daily transaction counter
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug; these panics only occur
//! during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_gauge, CounterVec,
    Encoder, Gauge, GaugeVec, IntGauge, TextEncoder,
};
use wbot_core::BotStatus;

use crate::error::{TelemetryError, TelemetryResult};

/// Dependencies reporting active in the latest health report.
pub static HEALTH_WORKING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "wbot_health_working",
        "Dependencies active in the latest health report"
    )
    .unwrap()
});

/// Dependencies covered by the latest health report.
pub static HEALTH_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "wbot_health_total",
        "Dependencies covered by the latest health report"
    )
    .unwrap()
});

/// Aggregate health status.
/// Labels: status (ok/warning/error)
pub static HEALTH_STATUS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "wbot_health_status",
        "Aggregate health status (1=current)",
        &["status"]
    )
    .unwrap()
});

/// Per-dependency reachability (1 = active).
pub static DEPENDENCY_UP: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "wbot_dependency_up",
        "Dependency reachability (1=active, 0=inactive)",
        &["dependency"]
    )
    .unwrap()
});

/// Bot lifecycle status.
/// Labels: status (inactive/active/paused)
pub static BOT_STATUS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "wbot_bot_status",
        "Bot lifecycle status (1=current)",
        &["status"]
    )
    .unwrap()
});

/// Simulation mode (1 = simulated data).
pub static SIMULATION_MODE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("wbot_simulation_mode", "Simulation mode (1=on)").unwrap()
});

/// Wallet connection state (1 = connected).
pub static WALLET_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("wbot_wallet_connected", "Wallet connection state (1=connected)").unwrap()
});

/// Refresh failures.
/// Labels: kind (balance/tokens/history/health)
pub static REFRESH_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "wbot_refresh_failures_total",
        "Total failed refresh attempts",
        &["kind"]
    )
    .unwrap()
});

/// Degraded-start decisions by outcome.
/// Labels: resolution (abort/enable_simulation/force_start/expired)
pub static DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "wbot_decisions_total",
        "Degraded-start decisions by resolution",
        &["resolution"]
    )
    .unwrap()
});

/// Transactions recorded today.
pub static DAILY_TRANSACTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "wbot_daily_transactions",
        "Transactions recorded in the current UTC day"
    )
    .unwrap()
});

/// Scheduler ticks.
/// Labels: period (short/long), outcome (ok/failed)
pub static SCHEDULER_TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "wbot_scheduler_ticks_total",
        "Refresh scheduler ticks",
        &["period", "outcome"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a completed health sweep.
    pub fn health_report(working: usize, total: usize, status: &str) {
        HEALTH_WORKING.set(working as i64);
        HEALTH_TOTAL.set(total as i64);
        for s in &["ok", "warning", "error"] {
            HEALTH_STATUS.with_label_values(&[s]).set(0.0);
        }
        HEALTH_STATUS.with_label_values(&[status]).set(1.0);
    }

    /// Record a single dependency's reachability.
    pub fn dependency_up(name: &str, up: bool) {
        DEPENDENCY_UP
            .with_label_values(&[name])
            .set(if up { 1.0 } else { 0.0 });
    }

    /// Set the bot lifecycle status. Only the current status is 1.
    pub fn bot_status(status: BotStatus) {
        for s in [BotStatus::Inactive, BotStatus::Active, BotStatus::Paused] {
            BOT_STATUS.with_label_values(&[s.as_str()]).set(0.0);
        }
        BOT_STATUS.with_label_values(&[status.as_str()]).set(1.0);
    }

    pub fn simulation_mode(enabled: bool) {
        SIMULATION_MODE.set(if enabled { 1.0 } else { 0.0 });
    }

    pub fn wallet_connected(connected: bool) {
        WALLET_CONNECTED.set(if connected { 1.0 } else { 0.0 });
    }

    /// Record a failed refresh of `kind`.
    pub fn refresh_failed(kind: &str) {
        REFRESH_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record how a degraded-start decision ended.
    pub fn decision_resolved(resolution: &str) {
        DECISIONS_TOTAL.with_label_values(&[resolution]).inc();
    }

    pub fn daily_transactions(count: u32) {
        DAILY_TRANSACTIONS.set(i64::from(count));
    }

    /// Record a scheduler tick.
    pub fn scheduler_tick(period: &str, ok: bool) {
        SCHEDULER_TICKS_TOTAL
            .with_label_values(&[period, if ok { "ok" } else { "failed" }])
            .inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
