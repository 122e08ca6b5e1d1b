//! User-tracked tokens.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// A token the user added to the watch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserToken {
    /// Token mint address.
    pub mint: String,
    /// Display symbol.
    pub symbol: String,
    /// Last known balance.
    #[serde(default)]
    pub balance: Decimal,
    /// Last known USD price.
    #[serde(default)]
    pub price_usd: Option<Decimal>,
}

impl UserToken {
    /// Create a validated token entry with no balance yet.
    pub fn new(mint: impl Into<String>, symbol: impl Into<String>) -> ValidationResult<Self> {
        let mint = mint.into().trim().to_string();
        let symbol = symbol.into().trim().to_string();
        if mint.is_empty() {
            return Err(ValidationError::InvalidToken("mint is empty".to_string()));
        }
        if symbol.is_empty() {
            return Err(ValidationError::InvalidToken("symbol is empty".to_string()));
        }
        Ok(Self {
            mint,
            symbol: symbol.to_uppercase(),
            balance: Decimal::ZERO,
            price_usd: None,
        })
    }

    /// USD value of the holding, if priced.
    #[must_use]
    pub fn value_usd(&self) -> Option<Decimal> {
        self.price_usd.map(|p| p * self.balance)
    }
}
