//! External dependency health for the wallet bot.
//!
//! Probes a fixed set of named dependencies and reduces the results to
//! one aggregate status:
//! - `HealthReport`: complete per-dependency map plus Ok/Warning/Error
//! - `HealthMonitor`: concurrent local sweep with per-probe timeouts
//! - `RemoteStatusMonitor`: black-box status endpoint client
//!
//! Every source returns a complete report. Failures turn into `Inactive`
//! entries, never into a missing report.

pub mod error;
pub mod monitor;
pub mod probe;
pub mod remote;
pub mod report;

pub use error::{HealthError, HealthResult};
pub use monitor::{HealthMonitor, HealthSource};
pub use probe::{BoxFuture, HealthProbe, HttpProbe, StaticProbe};
pub use remote::RemoteStatusMonitor;
pub use report::{AggregateStatus, DependencyStatus, EndpointEntry, HealthReport, StatusResponse};
