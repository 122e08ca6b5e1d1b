//! Remote status endpoint client.
//!
//! The endpoint is a black box returning its own view of dependency
//! health. The response is trusted only for per-endpoint statuses; the
//! counts and aggregate are rebuilt locally. When the endpoint cannot be
//! reached, every dependency seen so far is reported inactive.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{HealthError, HealthResult};
use crate::monitor::HealthSource;
use crate::probe::BoxFuture;
use crate::report::{HealthReport, StatusResponse};

/// Client for the remote status endpoint.
pub struct RemoteStatusMonitor {
    client: Client,
    url: String,
    /// Dependency names from config plus every name the endpoint reported.
    known: Mutex<BTreeSet<String>>,
}

impl RemoteStatusMonitor {
    /// Create a client.
    ///
    /// `expected` seeds the dependency list used when the very first call
    /// fails, so a fully failed sweep still has the right total.
    pub fn new(
        url: impl Into<String>,
        expected: Vec<String>,
        timeout: Duration,
    ) -> HealthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HealthError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            known: Mutex::new(expected.into_iter().collect()),
        })
    }

    /// Fetch and parse the endpoint body.
    pub async fn fetch(&self) -> HealthResult<StatusResponse> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| HealthError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HealthError::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HealthError::HttpClient(format!("Failed to read body: {e}")))?;
        parse_response(&body)
    }

    /// Fetch and convert into a complete report.
    pub async fn check(&self) -> HealthReport {
        let now_ms = Utc::now().timestamp_millis();
        match self.fetch().await {
            Ok(response) => self.accept(response, now_ms),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Status endpoint unavailable");
                self.fallback(now_ms)
            }
        }
    }

    fn accept(&self, response: StatusResponse, now_ms: i64) -> HealthReport {
        if response.endpoints.is_empty() && response.total > 0 {
            warn!(
                total = response.total,
                "Status response lists no endpoints but a non-zero total"
            );
            return self.fallback(now_ms);
        }

        if response.total != response.endpoints.len() {
            debug!(
                reported_total = response.total,
                listed = response.endpoints.len(),
                "Status response total disagrees with endpoint list"
            );
        }

        {
            let mut known = self.known.lock();
            known.extend(response.endpoints.iter().map(|e| e.name.clone()));
        }
        response.into_report(now_ms)
    }

    fn fallback(&self, now_ms: i64) -> HealthReport {
        let known = self.known.lock().clone();
        HealthReport::all_inactive(known, now_ms)
    }
}

impl HealthSource for RemoteStatusMonitor {
    fn probe(&self) -> BoxFuture<'_, HealthReport> {
        Box::pin(self.check())
    }

    fn dependency_names(&self) -> Vec<String> {
        self.known.lock().iter().cloned().collect()
    }
}

fn parse_response(body: &str) -> HealthResult<StatusResponse> {
    serde_json::from_str(body).map_err(|e| HealthError::Malformed(e.to_string()))
}
