//! Local health sweep.
//!
//! Runs every registered probe concurrently, each in its own task with
//! its own timeout. One probe failing, hanging or panicking only marks
//! that dependency inactive; the sweep always completes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::{HealthError, HealthResult};
use crate::probe::{BoxFuture, HealthProbe};
use crate::report::{DependencyStatus, HealthReport};

/// Anything that can produce a complete health report.
pub trait HealthSource: Send + Sync {
    /// Probe all dependencies. Never fails.
    fn probe(&self) -> BoxFuture<'_, HealthReport>;

    /// Names of the dependencies this source reports on.
    fn dependency_names(&self) -> Vec<String>;
}

/// Concurrent sweep over a fixed probe list.
pub struct HealthMonitor {
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Create a monitor. Probe names must be unique.
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>, probe_timeout: Duration) -> HealthResult<Self> {
        let mut seen = HashSet::new();
        for probe in &probes {
            if !seen.insert(probe.name().to_string()) {
                return Err(HealthError::DuplicateDependency(probe.name().to_string()));
            }
        }

        Ok(Self {
            probes,
            probe_timeout,
        })
    }

    /// Monitor with no registered dependencies; every sweep reports `Error`.
    #[must_use]
    pub fn empty(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
        }
    }

    /// Run one sweep.
    pub async fn sweep(&self) -> HealthReport {
        let timeout = self.probe_timeout;

        let handles: Vec<_> = self
            .probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, probe.check()).await {
                        Ok(Ok(())) => DependencyStatus::Active,
                        Ok(Err(e)) => {
                            debug!(dependency = %probe.name(), error = %e, "Probe failed");
                            DependencyStatus::Inactive
                        }
                        Err(_) => {
                            warn!(
                                dependency = %probe.name(),
                                timeout_ms = timeout.as_millis() as u64,
                                "Probe timed out"
                            );
                            DependencyStatus::Inactive
                        }
                    }
                })
            })
            .collect();

        let results = join_all(handles).await;

        let statuses = self.probes.iter().zip(results).map(|(probe, result)| {
            let status = result.unwrap_or_else(|e| {
                warn!(dependency = %probe.name(), error = %e, "Probe task aborted");
                DependencyStatus::Inactive
            });
            (probe.name().to_string(), status)
        });

        let report = HealthReport::from_statuses(statuses, Utc::now().timestamp_millis());
        debug!(
            working = report.working(),
            total = report.total(),
            status = %report.status(),
            "Health sweep complete"
        );
        report
    }
}

impl HealthSource for HealthMonitor {
    fn probe(&self) -> BoxFuture<'_, HealthReport> {
        Box::pin(self.sweep())
    }

    fn dependency_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StaticProbe;
    use crate::report::AggregateStatus;

    struct PanickingProbe;

    impl HealthProbe for PanickingProbe {
        fn name(&self) -> &str {
            "panicky"
        }

        fn check(&self) -> BoxFuture<'_, HealthResult<()>> {
            Box::pin(async { explode() })
        }
    }

    fn explode() -> HealthResult<()> {
        panic!("probe bug")
    }

    fn monitor(probes: Vec<Arc<dyn HealthProbe>>) -> HealthMonitor {
        HealthMonitor::new(probes, Duration::from_millis(200)).unwrap()
    }

    #[tokio::test]
    async fn test_all_up_is_ok() {
        let m = monitor(vec![
            Arc::new(StaticProbe::new("rpc", true)),
            Arc::new(StaticProbe::new("prices", true)),
        ]);
        let report = m.probe().await;
        assert_eq!(report.status(), AggregateStatus::Ok);
        assert_eq!(report.working(), 2);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out_without_blocking_others() {
        let fast = Arc::new(StaticProbe::new("fast", true));
        let slow = Arc::new(StaticProbe::new("slow", true).with_delay(Duration::from_secs(5)));
        let m = monitor(vec![fast.clone(), slow.clone()]);

        let started = std::time::Instant::now();
        let report = m.probe().await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.get("fast"), Some(DependencyStatus::Active));
        assert_eq!(report.get("slow"), Some(DependencyStatus::Inactive));
        assert_eq!(report.status(), AggregateStatus::Error);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let m = monitor(vec![
            Arc::new(PanickingProbe),
            Arc::new(StaticProbe::new("a", true)),
            Arc::new(StaticProbe::new("b", true)),
        ]);
        let report = m.probe().await;
        assert_eq!(report.total(), 3);
        assert_eq!(report.get("panicky"), Some(DependencyStatus::Inactive));
        assert_eq!(report.status(), AggregateStatus::Warning);
    }

    #[tokio::test]
    async fn test_fully_failed_sweep_is_complete() {
        let m = monitor(vec![
            Arc::new(StaticProbe::new("a", false)),
            Arc::new(StaticProbe::new("b", false)),
            Arc::new(StaticProbe::new("c", false)),
            Arc::new(StaticProbe::new("d", false)),
        ]);
        let report = m.probe().await;
        assert_eq!(report.total(), 4);
        assert_eq!(report.working(), 0);
        assert_eq!(report.inactive().len(), 4);
        assert_eq!(report.status(), AggregateStatus::Error);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = HealthMonitor::new(
            vec![
                Arc::new(StaticProbe::new("rpc", true)),
                Arc::new(StaticProbe::new("rpc", false)),
            ],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(HealthError::DuplicateDependency(n)) if n == "rpc"));
    }

    #[test]
    fn test_dependency_names_in_registration_order() {
        let m = monitor(vec![
            Arc::new(StaticProbe::new("z", true)),
            Arc::new(StaticProbe::new("a", true)),
        ]);
        assert_eq!(m.dependency_names(), vec!["z".to_string(), "a".to_string()]);
    }
}
