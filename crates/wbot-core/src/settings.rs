//! Bot strategy settings.
//!
//! Settings are pure configuration: validated at the edge and only ever
//! replaced as a whole. A partial update is merged onto a copy, the copy
//! is validated, and only then swapped in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Which side(s) the bot trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TradingMode {
    Buy,
    Sell,
    #[default]
    BuyAndSell,
}

/// What happens to tokens acquired by a trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenDisposition {
    /// Keep the tokens in the wallet.
    #[default]
    Hold,
    /// Sell them back right after the trade.
    Sell,
    /// Transfer them to the connected wallet.
    Transfer,
}

/// Strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSettings {
    #[serde(default)]
    pub mode: TradingMode,
    /// Minimum trade amount (SOL).
    #[serde(default = "default_min_amount")]
    pub min_amount: Decimal,
    /// Maximum trade amount (SOL).
    #[serde(default = "default_max_amount")]
    pub max_amount: Decimal,
    /// Minimum delay between trades (seconds).
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
    /// Maximum delay between trades (seconds).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default)]
    pub token_disposition: TokenDisposition,
}

fn default_min_amount() -> Decimal {
    Decimal::new(1, 2) // 0.01 SOL
}

fn default_max_amount() -> Decimal {
    Decimal::new(1, 1) // 0.1 SOL
}

fn default_min_delay_secs() -> u64 {
    30
}

fn default_max_delay_secs() -> u64 {
    120
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            mode: TradingMode::default(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            token_disposition: TokenDisposition::default(),
        }
    }
}

impl BotSettings {
    /// Check the bounds.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.min_amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidSettings(format!(
                "min_amount must be positive, got {}",
                self.min_amount
            )));
        }
        if self.min_amount > self.max_amount {
            return Err(ValidationError::InvalidSettings(format!(
                "min_amount {} exceeds max_amount {}",
                self.min_amount, self.max_amount
            )));
        }
        if self.max_delay_secs == 0 {
            return Err(ValidationError::InvalidSettings(
                "max_delay_secs must be positive".to_string(),
            ));
        }
        if self.min_delay_secs > self.max_delay_secs {
            return Err(ValidationError::InvalidSettings(format!(
                "min_delay_secs {} exceeds max_delay_secs {}",
                self.min_delay_secs, self.max_delay_secs
            )));
        }
        Ok(())
    }

    /// Merge `update` onto a copy and validate the result.
    ///
    /// `self` is untouched; the caller replaces it with the returned value.
    pub fn merged(&self, update: &BotSettingsUpdate) -> ValidationResult<Self> {
        let merged = Self {
            mode: update.mode.unwrap_or(self.mode),
            min_amount: update.min_amount.unwrap_or(self.min_amount),
            max_amount: update.max_amount.unwrap_or(self.max_amount),
            min_delay_secs: update.min_delay_secs.unwrap_or(self.min_delay_secs),
            max_delay_secs: update.max_delay_secs.unwrap_or(self.max_delay_secs),
            token_disposition: update.token_disposition.unwrap_or(self.token_disposition),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial settings update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotSettingsUpdate {
    pub mode: Option<TradingMode>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub min_delay_secs: Option<u64>,
    pub max_delay_secs: Option<u64>,
    pub token_disposition: Option<TokenDisposition>,
}

impl BotSettingsUpdate {
    /// True when the update carries no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
