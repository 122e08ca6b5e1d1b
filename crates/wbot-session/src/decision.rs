//! Degraded-start decisions.
//!
//! When the bot is asked to start while health is not `Ok` and simulation
//! is off, the orchestrator does not transition. It records a
//! `PendingDecision` and waits for the user to pick an option through
//! `resolve_decision`. Undecided requests expire and count as `Abort`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wbot_health::AggregateStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Start requested while dependencies are degraded.
    DegradedHealthStart,
}

/// User's answer to a pending decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionResolution {
    /// Do not start.
    Abort,
    /// Switch to simulated data, then start.
    EnableSimulation,
    /// Start on live data anyway.
    ForceStart,
}

impl DecisionResolution {
    pub const ALL: [DecisionResolution; 3] = [Self::Abort, Self::EnableSimulation, Self::ForceStart];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::EnableSimulation => "enable_simulation",
            Self::ForceStart => "force_start",
        }
    }
}

impl std::fmt::Display for DecisionResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An open question to the user, held in session state until answered or expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub id: Uuid,
    pub kind: DecisionKind,
    /// Health at the time of the request (None: never checked).
    pub health_status: Option<AggregateStatus>,
    pub options: Vec<DecisionResolution>,
    pub raised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingDecision {
    #[must_use]
    pub fn degraded_start(
        health_status: Option<AggregateStatus>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: DecisionKind::DegradedHealthStart,
            health_status,
            options: DecisionResolution::ALL.to_vec(),
            raised_at: now,
            expires_at: now + timeout,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn allows(&self, resolution: DecisionResolution) -> bool {
        self.options.contains(&resolution)
    }
}
