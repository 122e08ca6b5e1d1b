//! Session state machine.
//!
//! `SessionOrchestrator` is the only writer of `SessionState`. Every command
//! runs as one synchronous read-modify-write of the state held in a `watch`
//! channel; awaiting work (connection latency, data sources, probes) happens
//! between such steps and never while the state is being changed.
//!
//! Side effects of a step (persistence patch, notifications, metrics) are
//! collected while mutating and applied after the new state is published.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wbot_core::{
    BalanceSnapshot, BotSettings, BotSettingsUpdate, BotStatus, BoxFuture, Clock, SystemClock,
    UserToken, ValidationError, WalletAddress, WalletConnection,
};
use wbot_feed::{BalanceSource, SimulatedSource, TokenQuote, UnavailableSource};
use wbot_health::{HealthMonitor, HealthReport, HealthSource};
use wbot_persistence::{MemoryStore, SessionStore, SnapshotPatch, WriteBehind};
use wbot_telemetry::Metrics;

use crate::config::{SchedulerConfig, SessionConfig};
use crate::decision::{DecisionResolution, PendingDecision};
use crate::error::{ConflictError, DependencyError, SessionError, SessionResult};
use crate::notify::{NoopSink, NotificationSink, RefreshKind, SessionEvent};
use crate::scheduler::{RefreshScheduler, RefreshTarget, SchedulerHandle};
use crate::state::SessionState;

/// Result of `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// No usable persisted slot; defaults apply.
    Fresh,
    /// State rebuilt from the persisted slot.
    Restored,
}

/// Result of `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Health is degraded; the user must answer before anything happens.
    DecisionRequired(PendingDecision),
}

/// Result of `set_bot_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// Already in the requested status.
    Unchanged(BotStatus),
    Changed { from: BotStatus, to: BotStatus },
    DecisionRequired(PendingDecision),
}

// ============================================================================
// Step effects
// ============================================================================

/// Side effects collected during one state step.
struct Step {
    now: DateTime<Utc>,
    events: Vec<SessionEvent>,
    patch: SnapshotPatch,
}

impl Step {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            events: Vec::new(),
            patch: SnapshotPatch::default(),
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    fn persist(&mut self, patch: SnapshotPatch) {
        self.patch.merge(patch);
    }
}

fn is_allowed_transition(from: BotStatus, to: BotStatus) -> bool {
    use BotStatus::{Active, Inactive, Paused};
    matches!(
        (from, to),
        (Inactive, Active) | (Active, Inactive) | (Active, Paused) | (Paused, Active) | (Paused, Inactive)
    )
}

fn set_status(state: &mut SessionState, step: &mut Step, to: BotStatus) {
    let from = state.bot_status;
    if from == to {
        return;
    }
    state.bot_status = to;
    if to == BotStatus::Active {
        state.last_active_at = Some(step.now);
    }
    step.persist(SnapshotPatch::bot_status(to));
    step.emit(SessionEvent::BotStatusChanged { from, to });
}

/// Detach the wallet: cancels a pending decision, stops the bot and drops
/// wallet-side data. Settings, tokens and counters are kept.
fn release_wallet(state: &mut SessionState, step: &mut Step) {
    if let Some(decision) = state.pending_decision.take() {
        step.emit(SessionEvent::DecisionResolved {
            id: decision.id,
            resolution: DecisionResolution::Abort,
        });
    }
    set_status(state, step, BotStatus::Inactive);
    state.wallet = WalletConnection::default();
    state.balance = BalanceSnapshot::default();
    state.prices = Default::default();
}

fn begin_refresh(state: &mut SessionState) {
    state.refreshes_in_flight += 1;
    state.refreshing = true;
}

fn end_refresh(state: &mut SessionState) {
    state.refreshes_in_flight = state.refreshes_in_flight.saturating_sub(1);
    state.refreshing = state.refreshes_in_flight > 0;
}

fn record_failure(state: &mut SessionState, step: &mut Step, kind: RefreshKind, err: &DependencyError) {
    let message = err.to_string();
    state.error = Some(message.clone());
    step.emit(SessionEvent::RefreshFailed { kind, message });
}

/// Quotes keyed by mint. Every requested mint must be answered.
fn index_quotes(
    quotes: Vec<TokenQuote>,
    requested: &[String],
) -> Result<HashMap<String, TokenQuote>, DependencyError> {
    let by_mint: HashMap<String, TokenQuote> =
        quotes.into_iter().map(|q| (q.mint.clone(), q)).collect();
    if let Some(missing) = requested.iter().find(|m| !by_mint.contains_key(*m)) {
        return Err(DependencyError::Source(format!("no quote for token {missing}")));
    }
    Ok(by_mint)
}

// ============================================================================
// Builder
// ============================================================================

/// Wires capabilities into an orchestrator. Anything not provided gets an
/// inert default: no live data, an empty health sweep, an in-memory store,
/// no notifications and the system clock.
pub struct SessionOrchestratorBuilder {
    config: SessionConfig,
    live: Option<Arc<dyn BalanceSource>>,
    simulated: Option<Arc<dyn BalanceSource>>,
    health: Option<Arc<dyn HealthSource>>,
    store: Option<Arc<dyn SessionStore>>,
    sink: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SessionOrchestratorBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            live: None,
            simulated: None,
            health: None,
            store: None,
            sink: None,
            clock: None,
        }
    }

    /// Source used while simulation mode is off.
    pub fn live_source(mut self, source: Arc<dyn BalanceSource>) -> Self {
        self.live = Some(source);
        self
    }

    /// Source used while simulation mode is on.
    pub fn simulated_source(mut self, source: Arc<dyn BalanceSource>) -> Self {
        self.simulated = Some(source);
        self
    }

    pub fn health_source(mut self, health: Arc<dyn HealthSource>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SessionOrchestrator {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let initial = SessionState::new(self.config.transaction_cap, clock.now().date_naive());
        let (state, _) = watch::channel(initial);

        SessionOrchestrator {
            inner: Arc::new(Inner {
                live: self.live.unwrap_or_else(|| Arc::new(UnavailableSource)),
                simulated: self
                    .simulated
                    .unwrap_or_else(|| Arc::new(SimulatedSource::new())),
                health: self
                    .health
                    .unwrap_or_else(|| Arc::new(HealthMonitor::empty(Duration::from_secs(5)))),
                persistence: Arc::new(WriteBehind::new(store)),
                sink: self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
                config: self.config,
                state,
                write_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
                cleared: Notify::new(),
                clock,
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

// ============================================================================
// SessionOrchestrator
// ============================================================================

struct Inner {
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    /// Serializes read-modify-write steps.
    write_lock: Mutex<()>,
    /// Bumped by `clear_all_data`; results started under an older value are dropped.
    generation: AtomicU64,
    /// Wakes connects waiting out their latency when data is cleared.
    cleared: Notify,
    live: Arc<dyn BalanceSource>,
    simulated: Arc<dyn BalanceSource>,
    health: Arc<dyn HealthSource>,
    persistence: Arc<WriteBehind>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    /// Follow-up and flusher tasks joined on shutdown.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cloneable handle to the single session.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

/// Clears a transient flag if the owning command is dropped mid-await.
struct FlagGuard<'a> {
    orchestrator: &'a SessionOrchestrator,
    reset: fn(&mut SessionState),
    armed: bool,
}

impl<'a> FlagGuard<'a> {
    fn new(orchestrator: &'a SessionOrchestrator, reset: fn(&mut SessionState)) -> Self {
        Self {
            orchestrator,
            reset,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let reset = self.reset;
            self.orchestrator.step(|state, _| reset(state));
        }
    }
}

impl SessionOrchestrator {
    pub fn builder(config: SessionConfig) -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Write-behind buffer in front of the store.
    #[must_use]
    pub fn persistence(&self) -> &Arc<WriteBehind> {
        &self.inner.persistence
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected()
    }

    /// Run one synchronous state step and apply its side effects.
    ///
    /// Stale decisions and the day boundary are handled first, so every
    /// command sees them applied.
    fn step<R>(&self, f: impl FnOnce(&mut SessionState, &mut Step) -> R) -> R {
        let mut step = Step::new(self.inner.clock.now());
        let (result, changed) = {
            let _guard = self.inner.write_lock.lock();
            let mut next = self.inner.state.borrow().clone();
            Self::housekeeping(&mut next, &mut step);
            let result = f(&mut next, &mut step);
            let changed = self.inner.state.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
            (result, changed)
        };
        self.apply(step, changed);
        result
    }

    fn housekeeping(state: &mut SessionState, step: &mut Step) {
        if state.roll_day(step.now.date_naive()) {
            debug!(day = %state.counter_day, "Transaction counter reset for new day");
        }
        let expired = state
            .pending_decision
            .as_ref()
            .is_some_and(|d| d.is_expired(step.now));
        if expired {
            if let Some(decision) = state.pending_decision.take() {
                step.emit(SessionEvent::DecisionExpired { id: decision.id });
            }
        }
    }

    fn apply(&self, step: Step, changed: bool) {
        if !step.patch.is_empty() {
            self.inner.persistence.stage(step.patch);
        }

        for event in &step.events {
            match event {
                SessionEvent::DecisionResolved { resolution, .. } => {
                    Metrics::decision_resolved(resolution.as_str());
                }
                SessionEvent::DecisionExpired { .. } => Metrics::decision_resolved("expired"),
                SessionEvent::RefreshFailed { kind, .. } => Metrics::refresh_failed(kind.as_str()),
                _ => {}
            }
            self.inner.sink.notify(event);
        }

        if changed {
            let state = self.inner.state.borrow();
            Metrics::bot_status(state.bot_status);
            Metrics::simulation_mode(state.simulation_mode);
            Metrics::wallet_connected(state.is_connected());
            Metrics::daily_transactions(state.daily_transaction_count);
        }
    }

    fn source_for(&self, simulation_mode: bool) -> Arc<dyn BalanceSource> {
        if simulation_mode {
            Arc::clone(&self.inner.simulated)
        } else {
            Arc::clone(&self.inner.live)
        }
    }

    fn ensure_running(&self) -> SessionResult<()> {
        if self.inner.cancel.is_cancelled() {
            return Err(ConflictError::ShuttingDown.into());
        }
        Ok(())
    }

    /// Current clear generation. Read and compared inside steps only.
    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------------

    /// Load the persisted slot and rebuild state from it.
    ///
    /// A restored connected wallet gets the same follow-up refresh as a
    /// fresh connect.
    pub fn initialize(&self) -> SessionResult<InitOutcome> {
        let loaded = self.inner.persistence.load();
        let cap = self.inner.config.transaction_cap;

        let (outcome, resume) = self.step(|state, step| {
            let today = step.now.date_naive();
            match loaded {
                None => {
                    *state = SessionState::new(cap, today);
                    (InitOutcome::Fresh, false)
                }
                Some(snapshot) => {
                    *state = SessionState::restored(snapshot.clone(), cap, today);
                    let sanitized = state.persisted();
                    if sanitized != snapshot {
                        // Rewrite the slot with what survived revalidation.
                        step.persist(SnapshotPatch::full(sanitized));
                    }
                    (InitOutcome::Restored, state.is_connected())
                }
            }
        });

        let state = self.snapshot();
        info!(
            outcome = ?outcome,
            connected = state.is_connected(),
            bot_status = %state.bot_status,
            simulation_mode = state.simulation_mode,
            "Session initialized"
        );
        if resume {
            self.spawn_follow_up("restore");
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Wallet
    // ------------------------------------------------------------------------

    /// Connect a wallet.
    ///
    /// The address is validated before anything else. After the configured
    /// handshake latency the wallet is connected and a balance refresh plus
    /// health probe run in the background.
    pub async fn connect(&self, raw_address: &str) -> SessionResult<WalletAddress> {
        let address = WalletAddress::parse(raw_address)?;
        self.ensure_running()?;

        let generation = self.step(|state, _| {
            if state.connecting {
                return Err(SessionError::from(ConflictError::ConnectInProgress));
            }
            state.connecting = true;
            state.error = None;
            Ok(self.generation())
        })?;
        let guard = FlagGuard::new(self, |state| state.connecting = false);
        debug!(address = %address.short(), "Connecting wallet");

        tokio::select! {
            _ = self.inner.cancel.cancelled() => {
                return Err(ConflictError::ShuttingDown.into());
            }
            _ = self.inner.cleared.notified() => {
                debug!("Connect abandoned, session data cleared");
                return Err(ConflictError::SessionCleared.into());
            }
            _ = tokio::time::sleep(self.inner.config.connect_latency()) => {}
        }

        guard.disarm();
        self.step(|state, step| -> SessionResult<()> {
            state.connecting = false;
            if self.generation() != generation {
                debug!("Connect abandoned, session data cleared");
                return Err(ConflictError::SessionCleared.into());
            }
            if state.address() == Some(&address) {
                return Ok(());
            }
            if state.is_connected() {
                // Switching wallets stops anything tied to the old one.
                release_wallet(state, step);
            }
            state.wallet = WalletConnection::connected(address.clone());
            step.persist(SnapshotPatch::address(Some(address.to_string())));
            step.emit(SessionEvent::WalletConnected {
                address: address.clone(),
            });
            Ok(())
        })?;

        self.spawn_follow_up("connect");
        Ok(address)
    }

    /// Disconnect the wallet. The bot is forced to `Inactive` and any pending
    /// decision is cancelled; settings, tokens and counters survive.
    pub fn disconnect(&self) -> SessionResult<()> {
        let was_connected = self.step(|state, step| {
            let was_connected = state.is_connected();
            release_wallet(state, step);
            state.error = None;
            step.persist(SnapshotPatch::address(None));
            if was_connected {
                step.emit(SessionEvent::WalletDisconnected);
            }
            was_connected
        });
        if was_connected {
            debug!("Disconnect complete");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Data refresh
    // ------------------------------------------------------------------------

    /// Replace balance and prices from the active source.
    ///
    /// On failure the previous values stay and the error is recorded.
    pub async fn refresh_balance(&self) -> SessionResult<BalanceSnapshot> {
        let (address, source, generation) = self.step(|state, _| {
            let address = state
                .address()
                .cloned()
                .ok_or(ConflictError::WalletNotConnected)?;
            begin_refresh(state);
            Ok::<_, SessionError>((address, self.source_for(state.simulation_mode), self.generation()))
        })?;
        let guard = FlagGuard::new(self, end_refresh);

        let result = source.wallet_quote(&address).await;

        guard.disarm();
        self.step(|state, step| -> SessionResult<BalanceSnapshot> {
            end_refresh(state);
            match result {
                Ok(quote) => {
                    if self.generation() != generation || state.address() != Some(&address) {
                        debug!("Wallet changed during balance refresh, dropping quote");
                        return Err(ConflictError::WalletNotConnected.into());
                    }
                    let balance =
                        BalanceSnapshot::valued(quote.sol, quote.token_balance, &quote.prices);
                    state.balance = balance.clone();
                    state.prices = quote.prices;
                    state.error = None;
                    Ok(balance)
                }
                Err(e) => {
                    let err = DependencyError::from(e);
                    record_failure(state, step, RefreshKind::Balance, &err);
                    Err(err.into())
                }
            }
        })
    }

    /// Refresh every tracked token in one request.
    ///
    /// The token list is replaced as a whole, or left alone on failure.
    pub async fn refresh_balances(&self) -> SessionResult<Vec<UserToken>> {
        let (address, source, mints, generation) = self.step(|state, _| {
            let address = state
                .address()
                .cloned()
                .ok_or(ConflictError::WalletNotConnected)?;
            let mints: Vec<String> = state.user_tokens.iter().map(|t| t.mint.clone()).collect();
            Ok::<_, SessionError>((
                address,
                self.source_for(state.simulation_mode),
                mints,
                self.generation(),
            ))
        })?;
        if mints.is_empty() {
            return Ok(Vec::new());
        }

        let result = source
            .token_quotes(&address, &mints)
            .await
            .map_err(DependencyError::from)
            .and_then(|quotes| index_quotes(quotes, &mints));

        self.step(|state, step| -> SessionResult<Vec<UserToken>> {
            if self.generation() != generation {
                debug!("Session data cleared during token refresh, dropping quotes");
                return Err(ConflictError::SessionCleared.into());
            }
            if state.address() != Some(&address) {
                debug!("Wallet changed during token refresh, dropping quotes");
                return Err(ConflictError::WalletNotConnected.into());
            }
            match result {
                Ok(quotes) => {
                    let tokens: Vec<UserToken> = state
                        .user_tokens
                        .iter()
                        .map(|token| match quotes.get(&token.mint) {
                            Some(quote) => UserToken {
                                balance: quote.balance,
                                price_usd: quote.price_usd,
                                ..token.clone()
                            },
                            None => token.clone(),
                        })
                        .collect();
                    state.user_tokens = tokens.clone();
                    step.persist(SnapshotPatch::user_tokens(tokens.clone()));
                    Ok(tokens)
                }
                Err(err) => {
                    record_failure(state, step, RefreshKind::Tokens, &err);
                    Err(err.into())
                }
            }
        })
    }

    /// Replace the recent price history. Returns the number of samples kept.
    pub async fn refresh_history(&self) -> SessionResult<usize> {
        let (source, generation) =
            self.step(|state, _| (self.source_for(state.simulation_mode), self.generation()));
        let points = self.inner.config.history_points;

        let result = source.price_history(points).await;

        self.step(|state, step| -> SessionResult<usize> {
            if self.generation() != generation {
                return Err(ConflictError::SessionCleared.into());
            }
            match result {
                Ok(mut history) => {
                    if history.len() > points {
                        history.drain(..history.len() - points);
                    }
                    let kept = history.len();
                    state.price_history = history;
                    Ok(kept)
                }
                Err(e) => {
                    let err = DependencyError::from(e);
                    record_failure(state, step, RefreshKind::History, &err);
                    Err(err.into())
                }
            }
        })
    }

    /// Probe all dependencies and store the new report.
    pub async fn check_api_status(&self) -> SessionResult<HealthReport> {
        let report = self.inner.health.probe().await;

        Metrics::health_report(report.working(), report.total(), report.status().as_str());
        for (name, status) in report.iter() {
            Metrics::dependency_up(name, status.is_active());
        }

        self.step(|state, step| {
            let previous = state.health.as_ref().map(HealthReport::status);
            let current = report.status();
            if previous != Some(current) {
                step.emit(SessionEvent::HealthChanged {
                    previous,
                    current,
                    working: report.working(),
                    total: report.total(),
                });
                if !report.is_ok() && !state.simulation_mode {
                    step.emit(SessionEvent::SuggestSimulation {
                        status: current,
                        inactive: report.inactive(),
                    });
                }
            }
            state.health = Some(report.clone());
        });

        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Bot lifecycle
    // ------------------------------------------------------------------------

    /// Request a lifecycle transition.
    ///
    /// Starting from `Inactive` with degraded or unknown health and
    /// simulation off raises a decision instead of transitioning.
    pub fn set_bot_status(&self, to: BotStatus) -> SessionResult<StatusChange> {
        let timeout = self.inner.config.decision_timeout();
        self.step(|state, step| -> SessionResult<StatusChange> {
            let from = state.bot_status;
            if from == to {
                return Ok(StatusChange::Unchanged(from));
            }
            if !is_allowed_transition(from, to) {
                return Err(ConflictError::InvalidTransition { from, to }.into());
            }

            if to == BotStatus::Active {
                if !state.is_connected() {
                    return Err(ConflictError::WalletNotConnected.into());
                }
                if from == BotStatus::Inactive {
                    if state.pending_decision.is_some() {
                        return Err(ConflictError::DecisionPending.into());
                    }
                    let healthy = state.health.as_ref().is_some_and(HealthReport::is_ok);
                    if !healthy && !state.simulation_mode {
                        let decision = PendingDecision::degraded_start(
                            state.health.as_ref().map(HealthReport::status),
                            step.now,
                            timeout,
                        );
                        state.pending_decision = Some(decision.clone());
                        step.emit(SessionEvent::DecisionRequested {
                            decision: decision.clone(),
                        });
                        return Ok(StatusChange::DecisionRequired(decision));
                    }
                }
            }

            set_status(state, step, to);
            Ok(StatusChange::Changed { from, to })
        })
    }

    pub fn start(&self) -> SessionResult<StartOutcome> {
        match self.set_bot_status(BotStatus::Active)? {
            StatusChange::DecisionRequired(decision) => Ok(StartOutcome::DecisionRequired(decision)),
            StatusChange::Unchanged(_) | StatusChange::Changed { .. } => Ok(StartOutcome::Started),
        }
    }

    pub fn stop(&self) -> SessionResult<()> {
        self.set_bot_status(BotStatus::Inactive).map(|_| ())
    }

    pub fn pause(&self) -> SessionResult<()> {
        self.set_bot_status(BotStatus::Paused).map(|_| ())
    }

    pub fn resume(&self) -> SessionResult<()> {
        self.set_bot_status(BotStatus::Active).map(|_| ())
    }

    /// Answer the pending decision. Returns the resulting bot status.
    pub fn resolve_decision(
        &self,
        id: Uuid,
        resolution: DecisionResolution,
    ) -> SessionResult<BotStatus> {
        self.step(|state, step| -> SessionResult<BotStatus> {
            let matches = state
                .pending_decision
                .as_ref()
                .is_some_and(|d| d.id == id && d.allows(resolution));
            if !matches {
                return Err(ConflictError::NoPendingDecision.into());
            }
            state.pending_decision = None;
            step.emit(SessionEvent::DecisionResolved { id, resolution });

            if resolution == DecisionResolution::Abort {
                return Ok(state.bot_status);
            }
            if !state.is_connected() {
                return Err(ConflictError::WalletNotConnected.into());
            }
            if resolution == DecisionResolution::EnableSimulation && !state.simulation_mode {
                state.simulation_mode = true;
                step.persist(SnapshotPatch::simulated(true));
                step.emit(SessionEvent::SimulationModeChanged { enabled: true });
            }
            set_status(state, step, BotStatus::Active);
            Ok(BotStatus::Active)
        })
    }

    /// Apply decision expiry and the day boundary without any other change.
    pub fn expire_stale(&self) {
        self.step(|_, _| ());
    }

    // ------------------------------------------------------------------------
    // Settings and data
    // ------------------------------------------------------------------------

    /// Switch between live and simulated data. Returns whether it changed.
    pub fn set_simulation_mode(&self, enabled: bool) -> SessionResult<bool> {
        Ok(self.step(|state, step| {
            if state.simulation_mode == enabled {
                return false;
            }
            state.simulation_mode = enabled;
            step.persist(SnapshotPatch::simulated(enabled));
            step.emit(SessionEvent::SimulationModeChanged { enabled });
            true
        }))
    }

    /// Merge `update` into the settings; the merged result is validated
    /// before it replaces the current settings.
    pub fn set_bot_settings(&self, update: BotSettingsUpdate) -> SessionResult<BotSettings> {
        self.step(|state, step| -> SessionResult<BotSettings> {
            let merged = state.bot_settings.merged(&update)?;
            if merged != state.bot_settings {
                state.bot_settings = merged.clone();
                step.persist(SnapshotPatch::bot_settings(merged.clone()));
            }
            Ok(merged)
        })
    }

    /// Track a token.
    pub fn add_token(&self, mint: &str, symbol: &str) -> SessionResult<UserToken> {
        let token = UserToken::new(mint, symbol)?;
        self.step(|state, step| -> SessionResult<UserToken> {
            if state.user_tokens.iter().any(|t| t.mint == token.mint) {
                return Err(
                    ValidationError::InvalidToken(format!("{} is already tracked", token.mint))
                        .into(),
                );
            }
            state.user_tokens.push(token.clone());
            step.persist(SnapshotPatch::user_tokens(state.user_tokens.clone()));
            Ok(token)
        })
    }

    /// Stop tracking a token.
    pub fn remove_token(&self, mint: &str) -> SessionResult<UserToken> {
        let mint = mint.trim();
        self.step(|state, step| -> SessionResult<UserToken> {
            let Some(index) = state.user_tokens.iter().position(|t| t.mint == mint) else {
                return Err(ValidationError::InvalidToken(format!("{mint} is not tracked")).into());
            };
            let removed = state.user_tokens.remove(index);
            step.persist(SnapshotPatch::user_tokens(state.user_tokens.clone()));
            Ok(removed)
        })
    }

    /// Count one executed trade against today's cap. Returns today's count.
    pub fn record_transaction(&self) -> SessionResult<u32> {
        self.step(|state, step| -> SessionResult<u32> {
            if state.bot_status != BotStatus::Active {
                return Err(ConflictError::BotNotActive.into());
            }
            let cap = state.transaction_cap;
            if state.daily_transaction_count >= cap {
                return Err(ConflictError::TransactionCapReached { cap }.into());
            }
            state.daily_transaction_count += 1;
            debug!(
                count = state.daily_transaction_count,
                remaining = state.transactions_remaining(),
                "Transaction recorded"
            );
            if state.daily_transaction_count == cap {
                step.emit(SessionEvent::TransactionCapReached { cap });
            }
            Ok(state.daily_transaction_count)
        })
    }

    /// Reset everything to construction-time defaults and purge the store.
    /// Asking the user for confirmation is the caller's job.
    pub fn clear_all_data(&self) -> SessionResult<()> {
        let cap = self.inner.config.transaction_cap;
        self.step(|state, step| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            let was_connected = state.is_connected();
            release_wallet(state, step);
            if was_connected {
                step.emit(SessionEvent::WalletDisconnected);
            }

            let in_flight = state.refreshes_in_flight;
            *state = SessionState::new(cap, step.now.date_naive());
            state.refreshes_in_flight = in_flight;
            state.refreshing = in_flight > 0;
            step.emit(SessionEvent::DataCleared);
        });
        self.inner.cleared.notify_waiters();

        if let Err(e) = self.inner.persistence.clear() {
            let err = DependencyError::from(e);
            self.step(|state, step| record_failure(state, step, RefreshKind::Store, &err));
            return Err(err.into());
        }
        info!("Session data cleared");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------------

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    fn spawn_follow_up(&self, reason: &'static str) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let orchestrator = self.clone();
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!(reason, "Follow-up cancelled"),
                _ = orchestrator.follow_up(reason) => {}
            }
        });
        self.track(handle);
    }

    async fn follow_up(&self, reason: &'static str) {
        if let Err(e) = self.refresh_balance().await {
            debug!(reason, error = %e, "Follow-up balance refresh failed");
        }
        if let Err(e) = self.check_api_status().await {
            debug!(reason, error = %e, "Follow-up health check failed");
        }
    }

    /// Start the write-behind flusher. It stops on `shutdown`.
    pub fn spawn_persistence_flusher(&self, debounce: Duration) {
        let handle = tokio::spawn(
            Arc::clone(&self.inner.persistence).run_flusher(debounce, self.inner.cancel.child_token()),
        );
        self.track(handle);
    }

    /// Start periodic refreshes. The returned handle also stops on `shutdown`.
    pub fn spawn_scheduler(&self, config: &SchedulerConfig) -> SchedulerHandle {
        RefreshScheduler::new(config).spawn(Arc::new(self.clone()), self.inner.cancel.child_token())
    }

    /// Cancel background work, wait for it and flush persistence.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles = std::mem::take(&mut *self.inner.tasks.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        match self.inner.persistence.flush() {
            Ok(true) => debug!("Flushed pending session data"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Final persistence flush failed"),
        }
        info!("Session orchestrator shut down");
    }
}

impl RefreshTarget for SessionOrchestrator {
    fn short_tick(&self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            self.expire_stale();
            let balance = if self.is_connected() {
                self.refresh_balance().await.map(|_| ())
            } else {
                Ok(())
            };
            self.check_api_status().await?;
            balance
        })
    }

    fn long_tick(&self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            let tokens = if self.is_connected() {
                self.refresh_balances().await.map(|_| ())
            } else {
                Ok(())
            };
            self.refresh_history().await?;
            tokens
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotificationSink;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use wbot_core::{ManualClock, TradingMode};
    use wbot_feed::StaticSource;
    use wbot_health::{AggregateStatus, HealthProbe, StaticProbe};
    use wbot_persistence::PersistedSnapshot;

    const VALID: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<SessionEvent>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<SessionEvent> {
            self.events.lock().clone()
        }

        fn count(&self, pred: impl Fn(&SessionEvent) -> bool) -> usize {
            self.events.lock().iter().filter(|e| pred(e)).count()
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, event: &SessionEvent) {
            self.events.lock().push(event.clone());
        }
    }

    struct Harness {
        session: SessionOrchestrator,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        live: Arc<StaticSource>,
        probes: Vec<Arc<StaticProbe>>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn set_health(&self, up: usize) {
            for (i, probe) in self.probes.iter().enumerate() {
                probe.set_up(i < up);
            }
        }

        /// Connect and wait for the background follow-up to finish.
        async fn connect(&self) {
            let mut rx = self.session.subscribe();
            rx.borrow_and_update();
            self.session.connect(VALID).await.unwrap();
            tokio::time::timeout(
                Duration::from_secs(2),
                rx.wait_for(|s| s.health.is_some()),
            )
            .await
            .unwrap()
            .unwrap();
        }
    }

    fn conflict(e: ConflictError) -> SessionError {
        e.into()
    }

    /// Holds answers until the test hands out permits.
    struct GatedSource {
        inner: StaticSource,
        gate: tokio::sync::Semaphore,
        gate_wallet: bool,
        entered: std::sync::atomic::AtomicU32,
    }

    impl GatedSource {
        fn new(gate_wallet: bool) -> Self {
            Self {
                inner: StaticSource::new(dec!(2), dec!(1000), dec!(150), dec!(0.01)),
                gate: tokio::sync::Semaphore::new(0),
                gate_wallet,
                entered: std::sync::atomic::AtomicU32::new(0),
            }
        }

        fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }

        async fn wait(&self) {
            self.entered.fetch_add(1, Ordering::SeqCst);
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }

        async fn wait_entered(&self, n: u32) {
            tokio::time::timeout(Duration::from_secs(2), async {
                while self.entered.load(Ordering::SeqCst) < n {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .unwrap();
        }
    }

    impl BalanceSource for GatedSource {
        fn name(&self) -> &str {
            "gated"
        }

        fn wallet_quote<'a>(
            &'a self,
            address: &'a WalletAddress,
        ) -> BoxFuture<'a, wbot_feed::FeedResult<wbot_feed::BalanceQuote>> {
            Box::pin(async move {
                if self.gate_wallet {
                    self.wait().await;
                }
                self.inner.wallet_quote(address).await
            })
        }

        fn token_quotes<'a>(
            &'a self,
            address: &'a WalletAddress,
            mints: &'a [String],
        ) -> BoxFuture<'a, wbot_feed::FeedResult<Vec<TokenQuote>>> {
            Box::pin(async move {
                self.wait().await;
                self.inner.token_quotes(address, mints).await
            })
        }

        fn price_history(
            &self,
            points: usize,
        ) -> BoxFuture<'_, wbot_feed::FeedResult<Vec<wbot_core::PricePoint>>> {
            self.inner.price_history(points)
        }
    }

    fn gated_session(live: Arc<GatedSource>, store: Arc<MemoryStore>) -> SessionOrchestrator {
        SessionOrchestrator::builder(SessionConfig {
            connect_latency_ms: 0,
            ..Default::default()
        })
        .live_source(live)
        .store(store)
        .build()
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn harness_with_store(store: Arc<MemoryStore>) -> Harness {
        let clock = Arc::new(ManualClock::new(start_time()));
        let live = Arc::new(StaticSource::new(dec!(2), dec!(1000), dec!(150), dec!(0.01)));
        let probes: Vec<Arc<StaticProbe>> = ["rpc", "price", "jupiter", "status"]
            .into_iter()
            .map(|name| Arc::new(StaticProbe::new(name, true)))
            .collect();
        let monitor = HealthMonitor::new(
            probes
                .iter()
                .map(|p| Arc::clone(p) as Arc<dyn HealthProbe>)
                .collect(),
            Duration::from_secs(1),
        )
        .unwrap();
        let sink = Arc::new(RecordingSink::default());

        let config = SessionConfig {
            connect_latency_ms: 10,
            transaction_cap: 3,
            ..Default::default()
        };
        let session = SessionOrchestrator::builder(config)
            .live_source(live.clone())
            .simulated_source(Arc::new(SimulatedSource::with_seed(7)))
            .health_source(Arc::new(monitor))
            .store(store.clone())
            .sink(sink.clone())
            .clock(clock.clone())
            .build();

        Harness {
            session,
            clock,
            store,
            live,
            probes,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with_store(Arc::new(MemoryStore::new()))
    }

    fn flushed(h: &Harness) -> Option<PersistedSnapshot> {
        h.session.persistence().flush().unwrap();
        h.store.load()
    }

    // ---- connect / disconnect ----

    #[tokio::test]
    async fn test_connect_rejects_bad_length() {
        let h = harness();
        let too_long = format!("{VALID}X");
        for bad in ["", "short", too_long.as_str(), &VALID[..43]] {
            let err = h.session.connect(bad).await.unwrap_err();
            assert!(err.is_validation(), "{bad:?} -> {err}");
        }
        let state = h.session.snapshot();
        assert!(!state.wallet.connected);
        assert!(!state.connecting);
        assert_eq!(h.live.call_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_then_follow_up_refresh() {
        let h = harness();
        h.connect().await;

        let state = h.session.snapshot();
        assert!(state.wallet.connected);
        assert_eq!(state.wallet.address.as_ref().map(|a| a.as_str()), Some(VALID));
        assert!(!state.balance.is_empty());
        assert_eq!(state.balance.total, dec!(310.00));
        assert_eq!(state.health.as_ref().map(|r| r.status()), Some(AggregateStatus::Ok));
        assert_eq!(flushed(&h).unwrap().address.as_deref(), Some(VALID));
        assert_eq!(
            h.sink
                .count(|e| matches!(e, SessionEvent::WalletConnected { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_second_connect_while_in_flight_conflicts() {
        let h = harness();
        let session = h.session.clone();
        let first = tokio::spawn(async move { session.connect(VALID).await });
        tokio::task::yield_now().await;

        let err = h.session.connect(VALID).await.unwrap_err();
        assert_eq!(err, conflict(ConflictError::ConnectInProgress));
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_keeps_settings_and_clears_address() {
        let h = harness();
        h.connect().await;
        h.session
            .set_bot_settings(BotSettingsUpdate {
                mode: Some(TradingMode::Sell),
                ..Default::default()
            })
            .unwrap();
        h.session.start().unwrap();

        h.session.disconnect().unwrap();

        let state = h.session.snapshot();
        assert!(!state.wallet.connected);
        assert!(state.balance.is_empty());
        assert_eq!(state.bot_status, BotStatus::Inactive);
        assert_eq!(state.bot_settings.mode, TradingMode::Sell);

        let stored = flushed(&h).unwrap();
        assert!(stored.address.is_none());
        assert_eq!(stored.bot_status, BotStatus::Inactive);
        assert_eq!(stored.bot_settings.mode, TradingMode::Sell);
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_notifies_nothing() {
        let mut sink = MockNotificationSink::new();
        sink.expect_notify().never();
        let session = SessionOrchestrator::builder(SessionConfig::default())
            .sink(Arc::new(sink))
            .build();

        tokio_test::assert_ok!(session.disconnect());
        assert!(!session.snapshot().wallet.connected);
    }

    // ---- lifecycle ----

    #[tokio::test]
    async fn test_start_requires_wallet_regardless_of_health() {
        let h = harness();
        h.session.check_api_status().await.unwrap();
        assert!(h.session.snapshot().health.unwrap().is_ok());

        let err = h.session.start().unwrap_err();
        assert_eq!(err, conflict(ConflictError::WalletNotConnected));
        assert_eq!(h.session.snapshot().bot_status, BotStatus::Inactive);
    }

    #[tokio::test]
    async fn test_start_when_healthy() {
        let h = harness();
        h.connect().await;

        assert_eq!(h.session.start().unwrap(), StartOutcome::Started);
        let state = h.session.snapshot();
        assert_eq!(state.bot_status, BotStatus::Active);
        assert_eq!(state.last_active_at, Some(start_time()));
        assert_eq!(flushed(&h).unwrap().bot_status, BotStatus::Active);
    }

    #[tokio::test]
    async fn test_degraded_start_raises_decision() {
        let h = harness();
        h.set_health(3);
        h.connect().await;

        let StartOutcome::DecisionRequired(decision) = h.session.start().unwrap() else {
            panic!("expected decision");
        };
        assert_eq!(decision.health_status, Some(AggregateStatus::Warning));

        let state = h.session.snapshot();
        assert_eq!(state.bot_status, BotStatus::Inactive);
        assert_eq!(state.pending_decision, Some(decision));

        let err = h.session.start().unwrap_err();
        assert_eq!(err, conflict(ConflictError::DecisionPending));
    }

    #[tokio::test]
    async fn test_start_without_health_report_raises_decision() {
        let h = harness();
        h.session.connect(VALID).await.unwrap();
        // Follow-up has not run its probe yet on this single-threaded runtime.
        assert!(h.session.snapshot().health.is_none());

        let outcome = h.session.start().unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::DecisionRequired(PendingDecision {
                health_status: None,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_simulation_mode_skips_gate() {
        let h = harness();
        h.set_health(0);
        h.connect().await;
        h.session.set_simulation_mode(true).unwrap();

        assert_eq!(h.session.start().unwrap(), StartOutcome::Started);
    }

    #[tokio::test]
    async fn test_resolve_enable_simulation() {
        let h = harness();
        h.set_health(1);
        h.connect().await;
        let StartOutcome::DecisionRequired(decision) = h.session.start().unwrap() else {
            panic!("expected decision");
        };

        let status = h
            .session
            .resolve_decision(decision.id, DecisionResolution::EnableSimulation)
            .unwrap();
        assert_eq!(status, BotStatus::Active);

        let state = h.session.snapshot();
        assert!(state.simulation_mode);
        assert!(state.pending_decision.is_none());
        assert!(flushed(&h).unwrap().is_simulated);
    }

    #[tokio::test]
    async fn test_resolve_force_start_and_abort() {
        let h = harness();
        h.set_health(2);
        h.connect().await;

        let StartOutcome::DecisionRequired(first) = h.session.start().unwrap() else {
            panic!("expected decision");
        };
        assert_eq!(
            h.session
                .resolve_decision(first.id, DecisionResolution::Abort)
                .unwrap(),
            BotStatus::Inactive
        );
        // Stale id after resolution.
        assert_eq!(
            h.session
                .resolve_decision(first.id, DecisionResolution::ForceStart)
                .unwrap_err(),
            conflict(ConflictError::NoPendingDecision)
        );

        let StartOutcome::DecisionRequired(second) = h.session.start().unwrap() else {
            panic!("expected decision");
        };
        h.session
            .resolve_decision(second.id, DecisionResolution::ForceStart)
            .unwrap();
        let state = h.session.snapshot();
        assert_eq!(state.bot_status, BotStatus::Active);
        assert!(!state.simulation_mode);
    }

    #[tokio::test]
    async fn test_decision_expires_as_abort() {
        let h = harness();
        h.set_health(0);
        h.connect().await;
        let StartOutcome::DecisionRequired(decision) = h.session.start().unwrap() else {
            panic!("expected decision");
        };

        h.clock.advance(chrono::Duration::seconds(61));
        let err = h
            .session
            .resolve_decision(decision.id, DecisionResolution::ForceStart)
            .unwrap_err();
        assert_eq!(err, conflict(ConflictError::NoPendingDecision));
        assert_eq!(h.session.snapshot().bot_status, BotStatus::Inactive);
        assert!(h
            .sink
            .events()
            .contains(&SessionEvent::DecisionExpired { id: decision.id }));

        // A new start is possible again.
        assert!(matches!(
            h.session.start().unwrap(),
            StartOutcome::DecisionRequired(_)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_decision() {
        let h = harness();
        h.set_health(0);
        h.connect().await;
        let StartOutcome::DecisionRequired(decision) = h.session.start().unwrap() else {
            panic!("expected decision");
        };

        h.session.disconnect().unwrap();
        assert!(h.session.snapshot().pending_decision.is_none());
        assert_eq!(
            h.session
                .resolve_decision(decision.id, DecisionResolution::ForceStart)
                .unwrap_err(),
            conflict(ConflictError::NoPendingDecision)
        );
    }

    #[tokio::test]
    async fn test_transition_table() {
        let h = harness();
        h.connect().await;

        let err = h.session.pause().unwrap_err();
        assert_eq!(
            err,
            conflict(ConflictError::InvalidTransition {
                from: BotStatus::Inactive,
                to: BotStatus::Paused
            })
        );
        assert_eq!(
            h.session.set_bot_status(BotStatus::Inactive).unwrap(),
            StatusChange::Unchanged(BotStatus::Inactive)
        );

        h.session.start().unwrap();
        h.session.pause().unwrap();
        h.session.resume().unwrap();
        h.session.pause().unwrap();
        h.session.stop().unwrap();
        assert_eq!(h.session.snapshot().bot_status, BotStatus::Inactive);
    }

    // ---- settings, simulation, data ----

    #[tokio::test]
    async fn test_simulation_mode_idempotent() {
        let mut sink = MockNotificationSink::new();
        sink.expect_notify()
            .withf(|e| *e == SessionEvent::SimulationModeChanged { enabled: true })
            .times(1)
            .return_const(());
        let session = SessionOrchestrator::builder(SessionConfig::default())
            .sink(Arc::new(sink))
            .build();

        assert!(session.set_simulation_mode(true).unwrap());
        let once = session.snapshot();
        assert!(!session.set_simulation_mode(true).unwrap());
        assert_eq!(session.snapshot(), once);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let h = harness();
        let before = h.session.snapshot().bot_settings;

        let err = h
            .session
            .set_bot_settings(BotSettingsUpdate {
                min_amount: Some(dec!(5)),
                max_amount: Some(dec!(1)),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(h.session.snapshot().bot_settings, before);
        assert!(!h.session.persistence().has_pending());
    }

    #[tokio::test]
    async fn test_clear_all_data_requires_fresh_connect() {
        let h = harness();
        h.connect().await;
        h.session.set_simulation_mode(true).unwrap();
        h.session.add_token("MintA", "aaa").unwrap();
        flushed(&h);

        h.session.clear_all_data().unwrap();

        assert!(h.store.load().is_none());
        assert!(!h.session.persistence().has_pending());
        let state = h.session.snapshot();
        assert!(!state.simulation_mode);
        assert!(state.user_tokens.is_empty());
        assert_eq!(
            h.session.start().unwrap_err(),
            conflict(ConflictError::WalletNotConnected)
        );
    }

    #[tokio::test]
    async fn test_clear_all_data_reports_bot_stop() {
        let h = harness();
        h.connect().await;
        assert_eq!(h.session.start().unwrap(), StartOutcome::Started);

        h.session.clear_all_data().unwrap();

        assert_eq!(
            h.sink.count(|e| matches!(
                e,
                SessionEvent::BotStatusChanged {
                    from: BotStatus::Active,
                    to: BotStatus::Inactive
                }
            )),
            1
        );
        assert_eq!(
            h.sink.count(|e| matches!(e, SessionEvent::WalletDisconnected)),
            1
        );
        assert_eq!(h.sink.events().last(), Some(&SessionEvent::DataCleared));
    }

    #[tokio::test]
    async fn test_clear_all_data_abandons_pending_connect() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionOrchestrator::builder(SessionConfig {
            connect_latency_ms: 10_000,
            ..Default::default()
        })
        .store(store.clone())
        .build();

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.connect(VALID).await })
        };
        let mut rx = session.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.connecting))
            .await
            .unwrap()
            .unwrap();

        session.clear_all_data().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.unwrap_err(), conflict(ConflictError::SessionCleared));
        let state = session.snapshot();
        assert!(!state.is_connected());
        assert!(!state.connecting);
        session.persistence().flush().unwrap();
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_clear_all_data_drops_token_refresh_in_flight() {
        let store = Arc::new(MemoryStore::new());
        let live = Arc::new(GatedSource::new(false));
        let session = gated_session(live.clone(), store.clone());
        session.connect(VALID).await.unwrap();
        session.add_token("MintA", "aaa").unwrap();

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.refresh_balances().await })
        };
        live.wait_entered(1).await;

        session.clear_all_data().unwrap();
        live.release(1);

        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            conflict(ConflictError::SessionCleared)
        );
        assert!(session.snapshot().user_tokens.is_empty());
        session.persistence().flush().unwrap();
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_token_refresh_dropped_after_disconnect() {
        let store = Arc::new(MemoryStore::new());
        let live = Arc::new(GatedSource::new(false));
        let session = gated_session(live.clone(), store.clone());
        session.connect(VALID).await.unwrap();
        session.add_token("MintA", "aaa").unwrap();

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.refresh_balances().await })
        };
        live.wait_entered(1).await;

        session.disconnect().unwrap();
        live.release(1);

        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            conflict(ConflictError::WalletNotConnected)
        );
        let state = session.snapshot();
        assert!(!state.is_connected());
        assert_eq!(state.user_tokens[0].balance, Decimal::ZERO);
        session.persistence().flush().unwrap();
        assert_eq!(store.load().unwrap().user_tokens[0].balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_overlapping_balance_refreshes_keep_flag() {
        let live = Arc::new(GatedSource::new(true));
        let session = gated_session(live.clone(), Arc::new(MemoryStore::new()));

        // The connect follow-up is the first refresh.
        session.connect(VALID).await.unwrap();
        let second = {
            let session = session.clone();
            tokio::spawn(async move { session.refresh_balance().await })
        };
        live.wait_entered(2).await;
        assert_eq!(session.snapshot().refreshes_in_flight, 2);

        let mut rx = session.subscribe();
        live.release(1);
        let state = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.refreshes_in_flight == 1),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert!(state.refreshing);

        live.release(1);
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.refreshes_in_flight == 0 && !s.refreshing),
        )
        .await
        .unwrap()
        .unwrap();
        // Only one of the two is the spawned call; it must have succeeded.
        assert!(second.await.unwrap().is_ok());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_last_values() {
        let h = harness();
        h.connect().await;
        let before = h.session.snapshot().balance;

        h.live.set_failing(true);
        let err = h.session.refresh_balance().await.unwrap_err();
        assert!(matches!(err, SessionError::Dependency(DependencyError::Source(_))));

        let state = h.session.snapshot();
        assert_eq!(state.balance, before);
        assert!(state.error.is_some());
        assert!(!state.refreshing);
        assert_eq!(
            h.sink
                .count(|e| matches!(e, SessionEvent::RefreshFailed { kind: RefreshKind::Balance, .. })),
            1
        );

        h.live.set_failing(false);
        h.session.refresh_balance().await.unwrap();
        assert!(h.session.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_simulation_mode_switches_source() {
        let h = harness();
        h.connect().await;
        let live_calls = h.live.call_count();

        h.session.set_simulation_mode(true).unwrap();
        h.session.refresh_balance().await.unwrap();
        assert_eq!(h.live.call_count(), live_calls);
    }

    #[tokio::test]
    async fn test_token_list_management() {
        let h = harness();
        h.session.add_token("MintA", "aaa").unwrap();
        assert!(h.session.add_token("MintA", "other").unwrap_err().is_validation());
        assert!(h.session.add_token("", "x").unwrap_err().is_validation());

        h.connect().await;
        let tokens = h.session.refresh_balances().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].balance, dec!(100));
        assert_eq!(tokens[0].price_usd, Some(dec!(0.01)));

        let removed = h.session.remove_token("MintA").unwrap();
        assert_eq!(removed.symbol, "AAA");
        assert!(h.session.remove_token("MintA").unwrap_err().is_validation());
        assert!(flushed(&h).unwrap().user_tokens.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let h = harness();
        let kept = h.session.refresh_history().await.unwrap();
        assert_eq!(kept, h.session.config().history_points);
        assert_eq!(h.session.snapshot().price_history.len(), kept);
    }

    #[tokio::test]
    async fn test_transaction_cap_and_day_rollover() {
        let h = harness();
        assert_eq!(
            h.session.record_transaction().unwrap_err(),
            conflict(ConflictError::BotNotActive)
        );

        h.connect().await;
        h.session.start().unwrap();
        for expected in 1..=3 {
            assert_eq!(h.session.record_transaction().unwrap(), expected);
        }
        assert_eq!(
            h.session.record_transaction().unwrap_err(),
            conflict(ConflictError::TransactionCapReached { cap: 3 })
        );
        assert_eq!(
            h.sink
                .count(|e| matches!(e, SessionEvent::TransactionCapReached { .. })),
            1
        );

        h.clock.advance(chrono::Duration::days(1));
        assert_eq!(h.session.record_transaction().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_health_degradation_suggests_simulation() {
        let h = harness();
        h.session.check_api_status().await.unwrap();
        h.set_health(2);
        let report = h.session.check_api_status().await.unwrap();
        assert_eq!(report.status(), AggregateStatus::Error);
        assert_eq!(report.working(), 2);

        // Unchanged status does not repeat the advice.
        h.session.check_api_status().await.unwrap();

        assert_eq!(
            h.sink
                .count(|e| matches!(e, SessionEvent::SuggestSimulation { .. })),
            1
        );
        assert_eq!(
            h.sink
                .count(|e| matches!(e, SessionEvent::HealthChanged { .. })),
            2
        );
    }

    // ---- startup / shutdown ----

    #[tokio::test]
    async fn test_initialize_fresh() {
        let h = harness();
        assert_eq!(h.session.initialize().unwrap(), InitOutcome::Fresh);
        let state = h.session.snapshot();
        assert!(!state.simulation_mode);
        assert!(!state.wallet.connected);
    }

    #[tokio::test]
    async fn test_initialize_restores_slot() {
        let store = Arc::new(MemoryStore::with_snapshot(PersistedSnapshot {
            address: Some(VALID.to_string()),
            is_simulated: true,
            bot_status: BotStatus::Paused,
            ..Default::default()
        }));
        let h = harness_with_store(store);

        assert_eq!(h.session.initialize().unwrap(), InitOutcome::Restored);
        assert!(!h.session.persistence().has_pending());
        let state = h.session.snapshot();
        assert!(state.is_connected());
        assert!(state.simulation_mode);
        assert_eq!(state.bot_status, BotStatus::Paused);
        h.session.shutdown().await;
    }

    #[tokio::test]
    async fn test_initialize_drops_invalid_address() {
        let store = Arc::new(MemoryStore::with_snapshot(PersistedSnapshot {
            address: Some("bogus".to_string()),
            bot_status: BotStatus::Active,
            ..Default::default()
        }));
        let h = harness_with_store(store);

        assert_eq!(h.session.initialize().unwrap(), InitOutcome::Restored);
        assert_eq!(h.session.snapshot().bot_status, BotStatus::Inactive);
        let stored = flushed(&h).unwrap();
        assert!(stored.address.is_none());
        assert_eq!(stored.bot_status, BotStatus::Inactive);
    }

    #[tokio::test]
    async fn test_initialize_rewrites_invalid_settings() {
        let store = Arc::new(MemoryStore::with_snapshot(PersistedSnapshot {
            is_simulated: true,
            bot_settings: BotSettings {
                min_amount: dec!(5),
                max_amount: dec!(1),
                ..Default::default()
            },
            ..Default::default()
        }));
        let h = harness_with_store(store);

        assert_eq!(h.session.initialize().unwrap(), InitOutcome::Restored);
        assert_eq!(h.session.snapshot().bot_settings, BotSettings::default());
        let stored = flushed(&h).unwrap();
        assert_eq!(stored.bot_settings, BotSettings::default());
        assert!(stored.is_simulated);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_connect_and_flushes() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionOrchestrator::builder(SessionConfig {
            connect_latency_ms: 10_000,
            ..Default::default()
        })
        .store(store.clone())
        .build();
        session.set_simulation_mode(true).unwrap();

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.connect(VALID).await })
        };
        tokio::task::yield_now().await;
        assert!(session.snapshot().connecting);

        session.shutdown().await;
        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            conflict(ConflictError::ShuttingDown)
        );
        assert!(!session.snapshot().connecting);
        assert!(store.load().unwrap().is_simulated);
        assert_eq!(
            session.connect(VALID).await.unwrap_err(),
            conflict(ConflictError::ShuttingDown)
        );
    }
}
