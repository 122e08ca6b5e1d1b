//! Core domain types for the wallet bot session orchestrator.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `WalletAddress`: validated Base58 public key (fixed 44 characters)
//! - `WalletConnection`, `BalanceSnapshot`, `TokenPrices`: wallet-side session fields
//! - `BotStatus`, `BotSettings`: bot lifecycle and strategy parameters
//! - `UserToken`: user-tracked token holdings
//! - `Clock`: injectable time source (day boundary, decision expiry)

pub mod address;
pub mod clock;
pub mod error;
pub mod session;
pub mod settings;
pub mod token;

pub use address::{WalletAddress, WALLET_ADDRESS_LEN};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ValidationError, ValidationResult};
pub use session::{BalanceSnapshot, BotStatus, PricePoint, TokenPrices, WalletConnection};
pub use settings::{BotSettings, BotSettingsUpdate, TokenDisposition, TradingMode};
pub use token::UserToken;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
