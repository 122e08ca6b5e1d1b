//! Session orchestration for the wallet bot.
//!
//! Owns the single session state container and everything that mutates it:
//! - `SessionOrchestrator`: commands, lifecycle gate, degraded-start decisions
//! - `SessionState`: the observable state (via `watch`)
//! - `NotificationSink`: user-facing events (`LogSink`, `BroadcastSink`, `NoopSink`)
//! - `RefreshScheduler`: short/long periodic refresh tasks

pub mod config;
pub mod decision;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod scheduler;
pub mod state;

pub use config::{SchedulerConfig, SessionConfig};
pub use decision::{DecisionKind, DecisionResolution, PendingDecision};
pub use error::{ConflictError, DependencyError, SessionError, SessionResult};
pub use notify::{
    BroadcastSink, FanoutSink, LogSink, NoopSink, NotificationSink, RefreshKind,
    SessionEvent,
};
pub use orchestrator::{
    InitOutcome, SessionOrchestrator, SessionOrchestratorBuilder, StartOutcome, StatusChange,
};
pub use scheduler::{RefreshScheduler, RefreshTarget, SchedulerHandle};
pub use state::SessionState;
