//! Health report and aggregation rule.
//!
//! Rule (fixed threshold, order-independent):
//! - `total == 0` → Error (no evidence of health)
//! - `working == total` → Ok
//! - `working <= total / 2` → Error
//! - otherwise → Warning

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Active,
    Inactive,
}

impl DependencyStatus {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Reduced health of all dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Ok,
    Warning,
    Error,
}

impl AggregateStatus {
    /// Apply the threshold rule.
    #[must_use]
    pub fn from_counts(working: usize, total: usize) -> Self {
        if total == 0 {
            return Self::Error;
        }
        if working >= total {
            return Self::Ok;
        }
        // working <= total / 2 without integer division
        if working * 2 <= total {
            return Self::Error;
        }
        Self::Warning
    }

    /// Lowercase label used in metrics and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Complete result of one probe cycle.
///
/// Built in one piece and replaced as a whole; there is no API to change
/// a single entry of an existing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    endpoints: BTreeMap<String, DependencyStatus>,
    working: usize,
    status: AggregateStatus,
    last_checked_ms: i64,
}

impl HealthReport {
    /// Build a report from per-dependency results.
    ///
    /// A name reported twice counts once; if any of its entries is
    /// inactive, it is inactive.
    pub fn from_statuses<I, S>(statuses: I, last_checked_ms: i64) -> Self
    where
        I: IntoIterator<Item = (S, DependencyStatus)>,
        S: Into<String>,
    {
        let mut endpoints: BTreeMap<String, DependencyStatus> = BTreeMap::new();
        for (name, status) in statuses {
            endpoints
                .entry(name.into())
                .and_modify(|existing| {
                    if !status.is_active() {
                        *existing = DependencyStatus::Inactive;
                    }
                })
                .or_insert(status);
        }

        let working = endpoints.values().filter(|s| s.is_active()).count();
        let status = AggregateStatus::from_counts(working, endpoints.len());

        Self {
            endpoints,
            working,
            status,
            last_checked_ms,
        }
    }

    /// Report with every named dependency inactive.
    pub fn all_inactive<I, S>(names: I, last_checked_ms: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_statuses(
            names.into_iter().map(|n| (n, DependencyStatus::Inactive)),
            last_checked_ms,
        )
    }

    #[must_use]
    pub fn working(&self) -> usize {
        self.working
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn status(&self) -> AggregateStatus {
        self.status
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == AggregateStatus::Ok
    }

    #[must_use]
    pub fn last_checked_ms(&self) -> i64 {
        self.last_checked_ms
    }

    /// Status of one dependency.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<DependencyStatus> {
        self.endpoints.get(name).copied()
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DependencyStatus)> {
        self.endpoints.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Names of inactive dependencies.
    #[must_use]
    pub fn inactive(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, s)| !s.is_active())
            .map(|(n, _)| n.to_string())
            .collect()
    }

    /// Convert to the status endpoint wire shape.
    #[must_use]
    pub fn to_response(&self) -> StatusResponse {
        StatusResponse {
            working: self.working,
            total: self.total(),
            endpoints: self
                .iter()
                .map(|(name, status)| EndpointEntry {
                    name: name.to_string(),
                    status,
                })
                .collect(),
            last_checked: self.last_checked_ms,
            status: self.status,
        }
    }
}

/// One endpoint entry on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub name: String,
    pub status: DependencyStatus,
}

/// Status endpoint response body.
///
/// `working`, `total` and `status` are informational: the report is
/// rebuilt from `endpoints` so a server-side miscount cannot leak in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub working: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
    #[serde(default)]
    pub last_checked: i64,
    pub status: AggregateStatus,
}

impl StatusResponse {
    /// Rebuild a local report from the endpoint list.
    #[must_use]
    pub fn into_report(self, fallback_checked_ms: i64) -> HealthReport {
        let checked = if self.last_checked > 0 {
            self.last_checked
        } else {
            fallback_checked_ms
        };
        HealthReport::from_statuses(
            self.endpoints.into_iter().map(|e| (e.name, e.status)),
            checked,
        )
    }
}
