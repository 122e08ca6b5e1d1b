//! Periodic refresh.
//!
//! Two fixed-period tasks drive a `RefreshTarget`:
//! - short period: decision expiry, balance refresh, health check
//! - long period: token balances and price history
//!
//! A failed tick is logged and counted; the timer keeps running and the
//! other task is unaffected. Both tasks stop when the shared token is
//! cancelled or the handle is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wbot_core::BoxFuture;
use wbot_telemetry::Metrics;

use crate::config::SchedulerConfig;
use crate::error::SessionResult;

/// Work the scheduler performs on each tick.
pub trait RefreshTarget: Send + Sync + 'static {
    fn short_tick(&self) -> BoxFuture<'_, SessionResult<()>>;

    fn long_tick(&self) -> BoxFuture<'_, SessionResult<()>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Short,
    Long,
}

impl Period {
    fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

/// Scheduler configuration resolved to periods.
#[derive(Debug, Clone, Copy)]
pub struct RefreshScheduler {
    short: Duration,
    long: Duration,
}

impl RefreshScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            short: config.short_interval(),
            long: config.long_interval(),
        }
    }

    /// Explicit periods (sub-second periods are allowed here).
    pub fn with_periods(short: Duration, long: Duration) -> Self {
        Self { short, long }
    }

    /// Spawn both refresh tasks.
    pub fn spawn(self, target: Arc<dyn RefreshTarget>, cancel: CancellationToken) -> SchedulerHandle {
        info!(
            short_secs = self.short.as_secs_f64(),
            long_secs = self.long.as_secs_f64(),
            "Refresh scheduler started"
        );
        let tasks = vec![
            tokio::spawn(run_period(
                Period::Short,
                self.short,
                Arc::clone(&target),
                cancel.clone(),
            )),
            tokio::spawn(run_period(Period::Long, self.long, target, cancel.clone())),
        ];
        SchedulerHandle { cancel, tasks }
    }
}

async fn run_period(
    period: Period,
    every: Duration,
    target: Arc<dyn RefreshTarget>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let work = match period {
            Period::Short => target.short_tick(),
            Period::Long => target.long_tick(),
        };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = work => result,
        };

        match result {
            Ok(()) => {
                debug!(period = period.as_str(), "Refresh tick complete");
                Metrics::scheduler_tick(period.as_str(), true);
            }
            Err(e) => {
                warn!(period = period.as_str(), error = %e, "Refresh tick failed");
                Metrics::scheduler_tick(period.as_str(), false);
            }
        }
    }
    debug!(period = period.as_str(), "Refresh task stopped");
}

/// Owner of the running refresh tasks. Dropping it stops them.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// True while any refresh task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Stop both tasks and wait for them.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "Refresh task ended abnormally");
            }
        }
        info!("Refresh scheduler stopped");
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
