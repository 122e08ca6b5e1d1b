//! Session error taxonomy.
//!
//! Every command failure falls into one of three families:
//! - `ValidationError`: bad input, rejected before any state change
//! - `DependencyError`: a data source or the store failed; last-known-good
//!   values are kept and the message is recorded in `SessionState::error`
//! - `ConflictError`: the command is not allowed in the current state

use thiserror::Error;
use wbot_core::{BotStatus, ValidationError};
use wbot_feed::FeedError;
use wbot_persistence::PersistenceError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("Data source failed: {0}")]
    Source(String),

    #[error("Persistence failed: {0}")]
    Store(String),
}

impl From<FeedError> for DependencyError {
    fn from(e: FeedError) -> Self {
        Self::Source(e.to_string())
    }
}

impl From<PersistenceError> for DependencyError {
    fn from(e: PersistenceError) -> Self {
        Self::Store(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("Wallet is not connected")]
    WalletNotConnected,

    #[error("A start decision is already pending")]
    DecisionPending,

    #[error("No pending decision with that id")]
    NoPendingDecision,

    #[error("A wallet connection is already in progress")]
    ConnectInProgress,

    #[error("Cannot change bot status from {from} to {to}")]
    InvalidTransition { from: BotStatus, to: BotStatus },

    #[error("Bot is not active")]
    BotNotActive,

    #[error("Daily transaction cap of {cap} reached")]
    TransactionCapReached { cap: u32 },

    #[error("Session is shutting down")]
    ShuttingDown,

    #[error("Session data was cleared while the command was running")]
    SessionCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

impl SessionError {
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
