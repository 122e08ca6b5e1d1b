//! Wallet and bot-side session fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::address::WalletAddress;

/// Wallet connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnection {
    /// True once a connect completed and until disconnect.
    pub connected: bool,
    /// Connected address (None when disconnected).
    pub address: Option<WalletAddress>,
}

impl WalletConnection {
    /// Connected state for `address`.
    #[must_use]
    pub fn connected(address: WalletAddress) -> Self {
        Self {
            connected: true,
            address: Some(address),
        }
    }
}

/// Per-token USD prices used to value the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPrices {
    /// SOL price in USD.
    pub sol_usd: Decimal,
    /// Bot token price in USD.
    pub token_usd: Decimal,
    /// When the quote was produced (None before the first refresh).
    pub updated_at: Option<DateTime<Utc>>,
}

/// Wallet balances, replaced wholesale on every successful refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    /// SOL balance.
    pub sol: Decimal,
    /// Bot token balance.
    pub token_balance: Decimal,
    /// Total wallet value in USD.
    pub total: Decimal,
}

impl BalanceSnapshot {
    /// Build a snapshot, valuing both holdings at `prices`.
    #[must_use]
    pub fn valued(sol: Decimal, token_balance: Decimal, prices: &TokenPrices) -> Self {
        let total = (sol * prices.sol_usd + token_balance * prices.token_usd).round_dp(2);
        Self {
            sol,
            token_balance,
            total,
        }
    }

    /// True when every field is at its default (never refreshed or cleared).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sol.is_zero() && self.token_balance.is_zero() && self.total.is_zero()
    }
}

/// Bot lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// Bot is off.
    #[default]
    Inactive,
    /// Bot is running.
    Active,
    /// Bot is suspended and can resume.
    Paused,
}

impl BotStatus {
    /// Lowercase label used in metrics and notifications.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One point of recent price history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    /// Sample time (Unix milliseconds).
    pub timestamp_ms: i64,
    /// SOL price in USD.
    pub sol_usd: Decimal,
    /// Bot token price in USD.
    pub token_usd: Decimal,
}
