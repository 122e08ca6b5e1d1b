//! User-facing session events.
//!
//! The orchestrator reports what the user should hear about (wallet
//! connected, decisions, degraded health) to a `NotificationSink`. Sinks
//! are fire-and-forget; a slow or absent listener never blocks a command.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, trace, warn};
use uuid::Uuid;
use wbot_core::{BotStatus, WalletAddress};
use wbot_health::AggregateStatus;

use crate::decision::{DecisionResolution, PendingDecision};

/// What a failed refresh was refreshing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshKind {
    Balance,
    Tokens,
    History,
    Store,
}

impl RefreshKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Tokens => "tokens",
            Self::History => "history",
            Self::Store => "store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    WalletConnected {
        address: WalletAddress,
    },
    WalletDisconnected,
    BotStatusChanged {
        from: BotStatus,
        to: BotStatus,
    },
    DecisionRequested {
        decision: PendingDecision,
    },
    DecisionResolved {
        id: Uuid,
        resolution: DecisionResolution,
    },
    /// Nobody answered in time; treated as `Abort`.
    DecisionExpired {
        id: Uuid,
    },
    HealthChanged {
        previous: Option<AggregateStatus>,
        current: AggregateStatus,
        working: usize,
        total: usize,
    },
    /// Health degraded while live data is in use.
    SuggestSimulation {
        status: AggregateStatus,
        inactive: Vec<String>,
    },
    SimulationModeChanged {
        enabled: bool,
    },
    RefreshFailed {
        kind: RefreshKind,
        message: String,
    },
    TransactionCapReached {
        cap: u32,
    },
    DataCleared,
}

/// Destination for session events.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &SessionEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: &SessionEvent) {}
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: &SessionEvent) {
        match event {
            SessionEvent::WalletConnected { address } => {
                info!(address = %address.short(), "Wallet connected");
            }
            SessionEvent::WalletDisconnected => info!("Wallet disconnected"),
            SessionEvent::BotStatusChanged { from, to } => {
                info!(%from, %to, "Bot status changed");
            }
            SessionEvent::DecisionRequested { decision } => {
                warn!(
                    id = %decision.id,
                    health = ?decision.health_status,
                    expires_at = %decision.expires_at,
                    "Start needs confirmation: dependencies degraded"
                );
            }
            SessionEvent::DecisionResolved { id, resolution } => {
                info!(%id, %resolution, "Decision resolved");
            }
            SessionEvent::DecisionExpired { id } => {
                warn!(%id, "Decision expired, start aborted");
            }
            SessionEvent::HealthChanged {
                previous,
                current,
                working,
                total,
            } => {
                info!(?previous, %current, working, total, "Health status changed");
            }
            SessionEvent::SuggestSimulation { status, inactive } => {
                warn!(%status, ?inactive, "Dependencies degraded, consider simulation mode");
            }
            SessionEvent::SimulationModeChanged { enabled } => {
                info!(enabled, "Simulation mode changed");
            }
            SessionEvent::RefreshFailed { kind, message } => {
                warn!(kind = kind.as_str(), error = %message, "Refresh failed");
            }
            SessionEvent::TransactionCapReached { cap } => {
                warn!(cap, "Daily transaction cap reached");
            }
            SessionEvent::DataCleared => info!("All session data cleared"),
        }
    }
}

/// Fans events out to any number of async subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, event: &SessionEvent) {
        // No receivers is normal.
        if self.tx.send(event.clone()).is_err() {
            trace!("No event subscribers");
        }
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, event: &SessionEvent) {
        for sink in &self.sinks {
            sink.notify(event);
        }
    }
}
