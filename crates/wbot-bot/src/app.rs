//! Main application orchestration.
//!
//! Builds the session from configuration and drives it:
//! - Restore the persisted slot
//! - Background persistence flusher
//! - Periodic refresh scheduler
//! - Optional wallet connect on startup
//! - Graceful shutdown on Ctrl-C

use crate::config::{AppConfig, FeedConfig, HealthConfig};
use crate::error::AppResult;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use wbot_feed::{BalanceSource, SimulatedSource, StaticSource, UnavailableSource};
use wbot_health::{HealthMonitor, HealthProbe, HealthSource, HttpProbe, RemoteStatusMonitor};
use wbot_persistence::JsonFileStore;
use wbot_session::{
    BroadcastSink, FanoutSink, InitOutcome, LogSink, NotificationSink, SessionEvent,
    SessionOrchestrator,
};
use wbot_telemetry::Metrics;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Main application.
pub struct Application {
    config: AppConfig,
    session: SessionOrchestrator,
    events: BroadcastSink,
}

impl Application {
    /// Create a new application. Nothing runs until `run`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let health = build_health_source(&config.health)?;
        let store = Arc::new(JsonFileStore::new(&config.persistence.path));
        let events = BroadcastSink::new(EVENT_CAPACITY);
        let sink = FanoutSink::new(vec![
            Arc::new(LogSink) as Arc<dyn NotificationSink>,
            Arc::new(events.clone()),
        ]);

        let session = SessionOrchestrator::builder(config.session.clone())
            .live_source(build_live_source(&config.feed))
            .simulated_source(build_simulated_source(&config.feed))
            .health_source(health)
            .store(store)
            .sink(Arc::new(sink))
            .build();

        Ok(Self {
            config,
            session,
            events,
        })
    }

    /// The session this application drives.
    #[must_use]
    pub fn session(&self) -> &SessionOrchestrator {
        &self.session
    }

    /// Subscribe to session events. Only events after this call are seen.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Run until Ctrl-C.
    pub async fn run(self, address: Option<String>, simulate: bool) -> AppResult<()> {
        let shutdown = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
            }
        };
        self.run_until(address, simulate, shutdown).await
    }

    /// Run until `shutdown` completes.
    pub async fn run_until<F>(
        self,
        address: Option<String>,
        simulate: bool,
        shutdown: F,
    ) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let outcome = self.session.initialize()?;
        if outcome == InitOutcome::Fresh {
            info!("No stored session, starting fresh");
        }

        if simulate && self.session.set_simulation_mode(true)? {
            info!("Simulation mode enabled from command line");
        }

        self.session
            .spawn_persistence_flusher(self.config.persistence.flush_debounce());
        let scheduler = self.session.spawn_scheduler(&self.config.scheduler);

        info!(
            short_secs = self.config.scheduler.short_interval_secs,
            long_secs = self.config.scheduler.long_interval_secs,
            store = %self.config.persistence.path,
            "Application running"
        );

        let work = async {
            if let Some(raw) = address {
                match self.session.connect(&raw).await {
                    Ok(connected) => info!(address = %connected.short(), "Wallet connected"),
                    Err(e) => warn!(error = %e, "Startup connect failed"),
                }
            }
            std::future::pending::<()>().await;
        };

        tokio::select! {
            () = shutdown => {}
            () = work => {}
        }

        info!("Shutting down");
        scheduler.shutdown().await;
        self.session.shutdown().await;

        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }
        Ok(())
    }
}

fn build_health_source(config: &HealthConfig) -> AppResult<Arc<dyn HealthSource>> {
    let timeout = config.probe_timeout();

    if let Some(url) = &config.status_url {
        info!(url = %url, "Using remote status endpoint");
        let monitor = RemoteStatusMonitor::new(url.clone(), config.dependency_names.clone(), timeout)?;
        return Ok(Arc::new(monitor));
    }

    if config.endpoints.is_empty() {
        warn!("No health endpoints configured; health will report error");
        return Ok(Arc::new(HealthMonitor::empty(timeout)));
    }

    let probes = config
        .endpoints
        .iter()
        .map(|e| HttpProbe::new(e.name.clone(), e.url.clone()).map(|p| Arc::new(p) as Arc<dyn HealthProbe>))
        .collect::<Result<Vec<_>, _>>()?;
    info!(count = probes.len(), "Using local health probes");
    Ok(Arc::new(HealthMonitor::new(probes, timeout)?))
}

fn build_live_source(config: &FeedConfig) -> Arc<dyn BalanceSource> {
    match &config.static_quote {
        Some(q) => Arc::new(StaticSource::new(q.sol, q.token_balance, q.sol_usd, q.token_usd)),
        None => {
            warn!("No live balance source configured; live refreshes will fail");
            Arc::new(UnavailableSource)
        }
    }
}

fn build_simulated_source(config: &FeedConfig) -> Arc<dyn BalanceSource> {
    match config.simulation_seed {
        Some(seed) => Arc::new(SimulatedSource::with_seed(seed)),
        None => Arc::new(SimulatedSource::new()),
    }
}
