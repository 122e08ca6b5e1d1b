//! Wallet bot session service.
//!
//! Wires the session orchestrator to its capabilities from configuration:
//! - Health source (local HTTP probes or the remote status endpoint)
//! - Live and simulated balance sources
//! - JSON file persistence with a write-behind flusher
//! - Periodic refresh scheduler and log notifications

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
