//! Synthetic data for simulation mode.
//!
//! Prices follow a bounded random walk; balances are drawn once per
//! source and drift slightly between quotes. The numbers are demo data:
//! only their shape (positive, complete, plausible) matters.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::trace;
use wbot_core::{BoxFuture, PricePoint, TokenPrices, WalletAddress};

use crate::error::FeedResult;
use crate::source::{BalanceQuote, BalanceSource, TokenQuote};

/// Maximum relative price move per quote (2%).
const MAX_STEP: f64 = 0.02;

/// Spacing of synthetic history samples.
const HISTORY_STEP_MS: i64 = 60_000;

struct WalkState {
    rng: StdRng,
    sol_usd: f64,
    token_usd: f64,
    sol: f64,
    token_balance: f64,
}

impl WalkState {
    fn step(&mut self) {
        let sol_move = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
        let token_move = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
        self.sol_usd = (self.sol_usd * (1.0 + sol_move)).clamp(20.0, 500.0);
        self.token_usd = (self.token_usd * (1.0 + token_move)).clamp(0.0001, 1.0);
        self.sol = (self.sol * (1.0 + self.rng.gen_range(-0.001..=0.001))).max(0.01);
    }
}

/// Random-walk data source used while simulation mode is on.
pub struct SimulatedSource {
    state: Mutex<WalkState>,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSource {
    /// Create a source seeded from entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a reproducible source.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(mut rng: StdRng) -> Self {
        let state = WalkState {
            sol_usd: rng.gen_range(120.0..180.0),
            token_usd: rng.gen_range(0.001..0.01),
            sol: rng.gen_range(0.5..5.0),
            token_balance: rng.gen_range(1_000.0..100_000.0_f64).round(),
            rng,
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn next_prices(&self) -> (TokenPrices, Decimal, Decimal) {
        let mut state = self.state.lock();
        state.step();
        let prices = TokenPrices {
            sol_usd: to_decimal(state.sol_usd, 2),
            token_usd: to_decimal(state.token_usd, 6),
            updated_at: Some(Utc::now()),
        };
        (
            prices,
            to_decimal(state.sol, 4),
            to_decimal(state.token_balance, 0),
        )
    }

    fn synth_token_quotes(&self, mints: &[String]) -> Vec<TokenQuote> {
        let mut state = self.state.lock();
        mints
            .iter()
            .map(|mint| TokenQuote {
                mint: mint.clone(),
                balance: to_decimal(state.rng.gen_range(10.0..10_000.0_f64).round(), 0),
                price_usd: Some(to_decimal(state.rng.gen_range(0.0001..2.0), 6)),
            })
            .collect()
    }

    fn synth_history(&self, points: usize) -> Vec<PricePoint> {
        let now_ms = Utc::now().timestamp_millis();
        let mut state = self.state.lock();
        let mut sol_usd = state.sol_usd;
        let mut token_usd = state.token_usd;

        // Walk backwards from the current price, then reverse.
        let mut history = Vec::with_capacity(points);
        for i in 0..points {
            history.push(PricePoint {
                timestamp_ms: now_ms - (i as i64) * HISTORY_STEP_MS,
                sol_usd: to_decimal(sol_usd, 2),
                token_usd: to_decimal(token_usd, 6),
            });
            sol_usd = (sol_usd * (1.0 + state.rng.gen_range(-MAX_STEP..=MAX_STEP))).max(1.0);
            token_usd = (token_usd * (1.0 + state.rng.gen_range(-MAX_STEP..=MAX_STEP))).max(0.0001);
        }
        history.reverse();
        history
    }
}

fn to_decimal(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(dp)
}

impl BalanceSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn wallet_quote<'a>(
        &'a self,
        address: &'a WalletAddress,
    ) -> BoxFuture<'a, FeedResult<BalanceQuote>> {
        let (prices, sol, token_balance) = self.next_prices();
        trace!(address = %address.short(), %sol, "Simulated wallet quote");
        Box::pin(async move {
            Ok(BalanceQuote {
                sol,
                token_balance,
                prices,
            })
        })
    }

    fn token_quotes<'a>(
        &'a self,
        _address: &'a WalletAddress,
        mints: &'a [String],
    ) -> BoxFuture<'a, FeedResult<Vec<TokenQuote>>> {
        let quotes = self.synth_token_quotes(mints);
        Box::pin(async move { Ok(quotes) })
    }

    fn price_history(&self, points: usize) -> BoxFuture<'_, FeedResult<Vec<PricePoint>>> {
        let history = self.synth_history(points);
        Box::pin(async move { Ok(history) })
    }
}
