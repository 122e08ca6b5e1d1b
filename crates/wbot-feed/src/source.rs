//! Balance source capability.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use wbot_core::{BoxFuture, PricePoint, TokenPrices, WalletAddress};

use crate::error::{FeedError, FeedResult};

/// Wallet balances and prices from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceQuote {
    pub sol: Decimal,
    pub token_balance: Decimal,
    pub prices: TokenPrices,
}

/// Holding and price of one user token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenQuote {
    pub mint: String,
    pub balance: Decimal,
    pub price_usd: Option<Decimal>,
}

/// Source of wallet balances and market prices.
///
/// Implementations return complete results or an error; the orchestrator
/// never merges partial answers.
pub trait BalanceSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// SOL + bot token balance with current prices.
    fn wallet_quote<'a>(&'a self, address: &'a WalletAddress)
        -> BoxFuture<'a, FeedResult<BalanceQuote>>;

    /// Holdings for each mint, in the order given.
    fn token_quotes<'a>(
        &'a self,
        address: &'a WalletAddress,
        mints: &'a [String],
    ) -> BoxFuture<'a, FeedResult<Vec<TokenQuote>>>;

    /// Most recent `points` price samples, oldest first.
    fn price_history(&self, points: usize) -> BoxFuture<'_, FeedResult<Vec<PricePoint>>>;
}

/// No-op source: every call reports the source as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSource;

impl BalanceSource for UnavailableSource {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn wallet_quote<'a>(
        &'a self,
        _address: &'a WalletAddress,
    ) -> BoxFuture<'a, FeedResult<BalanceQuote>> {
        Box::pin(async { Err(FeedError::Unavailable("no live source configured".to_string())) })
    }

    fn token_quotes<'a>(
        &'a self,
        _address: &'a WalletAddress,
        _mints: &'a [String],
    ) -> BoxFuture<'a, FeedResult<Vec<TokenQuote>>> {
        Box::pin(async { Err(FeedError::Unavailable("no live source configured".to_string())) })
    }

    fn price_history(&self, _points: usize) -> BoxFuture<'_, FeedResult<Vec<PricePoint>>> {
        Box::pin(async { Err(FeedError::Unavailable("no live source configured".to_string())) })
    }
}

/// Source returning fixed data, switchable to failing.
#[derive(Debug)]
pub struct StaticSource {
    sol: RwLock<Decimal>,
    token_balance: RwLock<Decimal>,
    sol_usd: RwLock<Decimal>,
    token_usd: RwLock<Decimal>,
    failing: AtomicBool,
    calls: AtomicU32,
}

impl StaticSource {
    /// Create a source with fixed balances and prices.
    pub fn new(sol: Decimal, token_balance: Decimal, sol_usd: Decimal, token_usd: Decimal) -> Self {
        Self {
            sol: RwLock::new(sol),
            token_balance: RwLock::new(token_balance),
            sol_usd: RwLock::new(sol_usd),
            token_usd: RwLock::new(token_usd),
            failing: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Change the SOL balance returned by later quotes.
    pub fn set_sol(&self, sol: Decimal) {
        *self.sol.write() = sol;
    }

    /// Number of calls served (including failed ones).
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> FeedResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::Request("static source set to fail".to_string()));
        }
        Ok(())
    }

    fn prices(&self) -> TokenPrices {
        TokenPrices {
            sol_usd: *self.sol_usd.read(),
            token_usd: *self.token_usd.read(),
            updated_at: Some(Utc::now()),
        }
    }
}

impl BalanceSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn wallet_quote<'a>(
        &'a self,
        _address: &'a WalletAddress,
    ) -> BoxFuture<'a, FeedResult<BalanceQuote>> {
        Box::pin(async move {
            self.begin()?;
            Ok(BalanceQuote {
                sol: *self.sol.read(),
                token_balance: *self.token_balance.read(),
                prices: self.prices(),
            })
        })
    }

    fn token_quotes<'a>(
        &'a self,
        _address: &'a WalletAddress,
        mints: &'a [String],
    ) -> BoxFuture<'a, FeedResult<Vec<TokenQuote>>> {
        Box::pin(async move {
            self.begin()?;
            let price = *self.token_usd.read();
            Ok(mints
                .iter()
                .map(|mint| TokenQuote {
                    mint: mint.clone(),
                    balance: Decimal::ONE_HUNDRED,
                    price_usd: Some(price),
                })
                .collect())
        })
    }

    fn price_history(&self, points: usize) -> BoxFuture<'_, FeedResult<Vec<PricePoint>>> {
        Box::pin(async move {
            self.begin()?;
            let now_ms = Utc::now().timestamp_millis();
            let prices = self.prices();
            Ok((0..points)
                .rev()
                .map(|i| PricePoint {
                    timestamp_ms: now_ms - (i as i64) * 60_000,
                    sol_usd: prices.sol_usd,
                    token_usd: prices.token_usd,
                })
                .collect())
        })
    }
}
