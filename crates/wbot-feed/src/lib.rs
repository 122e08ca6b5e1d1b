//! Balance and price data sources for the wallet bot.
//!
//! The orchestrator reads wallet balances, token holdings and prices
//! through the `BalanceSource` capability:
//! - `UnavailableSource`: no-op default, every call fails
//! - `SimulatedSource`: synthetic random-walk data for simulation mode
//! - `StaticSource`: fixed, switchable data (offline wiring and tests)

pub mod error;
pub mod simulated;
pub mod source;

pub use error::{FeedError, FeedResult};
pub use simulated::SimulatedSource;
pub use source::{BalanceQuote, BalanceSource, StaticSource, TokenQuote, UnavailableSource};
