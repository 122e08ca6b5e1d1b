//! Health probes.
//!
//! A probe checks one named dependency. Probes are dyn-compatible so the
//! monitor can hold a fixed heterogeneous list of them.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{HealthError, HealthResult};

pub use wbot_core::BoxFuture;

/// Default timeout for HTTP probe requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One external dependency check.
pub trait HealthProbe: Send + Sync {
    /// Dependency name (unique within a monitor).
    fn name(&self) -> &str;

    /// Check the dependency. `Ok(())` means reachable and healthy.
    fn check(&self) -> BoxFuture<'_, HealthResult<()>>;
}

/// Probe that GETs a URL; any 2xx response is healthy.
pub struct HttpProbe {
    name: String,
    url: String,
    client: Client,
}

impl HttpProbe {
    /// Create a new HTTP probe.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> HealthResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| HealthError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HealthProbe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> BoxFuture<'_, HealthResult<()>> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| HealthError::HttpClient(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            debug!(dependency = %self.name, %status, "HTTP probe response");
            if status.is_success() {
                Ok(())
            } else {
                Err(HealthError::HttpStatus(status.as_u16()))
            }
        })
    }
}

/// Probe with a switchable outcome and optional artificial delay.
///
/// Used for dependencies without a reachable endpoint (offline demo) and
/// in tests.
#[derive(Debug)]
pub struct StaticProbe {
    name: String,
    up: AtomicBool,
    delay: Duration,
    checks: AtomicU32,
}

impl StaticProbe {
    /// Create a probe that reports `up`.
    pub fn new(name: impl Into<String>, up: bool) -> Self {
        Self {
            name: name.into(),
            up: AtomicBool::new(up),
            delay: Duration::ZERO,
            checks: AtomicU32::new(0),
        }
    }

    /// Delay every check by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Change the reported outcome.
    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    /// Number of checks performed so far.
    #[must_use]
    pub fn check_count(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

impl HealthProbe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> BoxFuture<'_, HealthResult<()>> {
        Box::pin(async move {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(HealthError::ProbeFailed(format!("{} is down", self.name)))
            }
        })
    }
}
