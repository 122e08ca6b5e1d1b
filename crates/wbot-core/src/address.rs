//! Wallet address validation.
//!
//! The orchestrator only accepts Base58 public keys of the conventional
//! 44-character length. Anything else is a validation error, never a
//! connection attempt.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Required wallet address length in characters.
pub const WALLET_ADDRESS_LEN: usize = 44;

/// A wallet address that passed the length rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Validate and wrap a raw address.
    pub fn parse(raw: impl Into<String>) -> ValidationResult<Self> {
        let raw = raw.into();
        let actual = raw.chars().count();
        if actual != WALLET_ADDRESS_LEN {
            return Err(ValidationError::InvalidAddressLength {
                expected: WALLET_ADDRESS_LEN,
                actual,
            });
        }
        Ok(Self(raw))
    }

    /// Borrow the address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for logs and notifications (`AbCd...WxYz`).
    #[must_use]
    pub fn short(&self) -> String {
        let head: String = self.0.chars().take(4).collect();
        let tail: String = self.0.chars().skip(WALLET_ADDRESS_LEN - 4).collect();
        format!("{head}...{tail}")
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
