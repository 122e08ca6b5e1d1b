//! Observable session state.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use wbot_core::{
    BalanceSnapshot, BotSettings, BotStatus, PricePoint, TokenPrices, UserToken, WalletAddress,
    WalletConnection,
};
use wbot_health::HealthReport;
use wbot_persistence::PersistedSnapshot;

use crate::decision::PendingDecision;

/// Everything screens read. Published through a `watch` channel; every
/// command replaces it in one synchronous step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub wallet: WalletConnection,
    pub balance: BalanceSnapshot,
    pub prices: TokenPrices,
    pub bot_status: BotStatus,
    pub bot_settings: BotSettings,
    pub simulation_mode: bool,
    /// Last time the bot entered `Active`.
    pub last_active_at: Option<DateTime<Utc>>,
    pub daily_transaction_count: u32,
    pub transaction_cap: u32,
    /// UTC day the transaction counter belongs to.
    pub counter_day: NaiveDate,
    pub user_tokens: Vec<UserToken>,
    pub price_history: Vec<PricePoint>,

    // Transient
    pub connecting: bool,
    /// True while any balance refresh is running.
    pub refreshing: bool,
    pub refreshes_in_flight: u32,
    pub error: Option<String>,
    pub pending_decision: Option<PendingDecision>,
    pub health: Option<HealthReport>,
}

impl SessionState {
    /// Construction-time defaults.
    #[must_use]
    pub fn new(transaction_cap: u32, today: NaiveDate) -> Self {
        Self {
            wallet: WalletConnection::default(),
            balance: BalanceSnapshot::default(),
            prices: TokenPrices::default(),
            bot_status: BotStatus::Inactive,
            bot_settings: BotSettings::default(),
            simulation_mode: false,
            last_active_at: None,
            daily_transaction_count: 0,
            transaction_cap,
            counter_day: today,
            user_tokens: Vec::new(),
            price_history: Vec::new(),
            connecting: false,
            refreshing: false,
            refreshes_in_flight: 0,
            error: None,
            pending_decision: None,
            health: None,
        }
    }

    /// Rebuild state from a persisted slot.
    ///
    /// The stored address is revalidated; a bad one is dropped and the bot
    /// restored as `Inactive`, since an active bot needs a connected wallet.
    #[must_use]
    pub fn restored(snapshot: PersistedSnapshot, transaction_cap: u32, today: NaiveDate) -> Self {
        let mut state = Self::new(transaction_cap, today);

        let address = snapshot
            .address
            .and_then(|raw| match WalletAddress::parse(raw) {
                Ok(address) => Some(address),
                Err(e) => {
                    warn!(error = %e, "Discarding invalid persisted wallet address");
                    None
                }
            });

        state.simulation_mode = snapshot.is_simulated;
        state.user_tokens = snapshot.user_tokens;
        state.bot_settings = match snapshot.bot_settings.validate() {
            Ok(()) => snapshot.bot_settings,
            Err(e) => {
                warn!(error = %e, "Discarding invalid persisted bot settings");
                BotSettings::default()
            }
        };
        if let Some(address) = address {
            state.wallet = WalletConnection::connected(address);
            state.bot_status = snapshot.bot_status;
        }
        state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.wallet.connected && self.wallet.address.is_some()
    }

    /// Connected address, if any.
    #[must_use]
    pub fn address(&self) -> Option<&WalletAddress> {
        if self.wallet.connected {
            self.wallet.address.as_ref()
        } else {
            None
        }
    }

    /// Whitelisted subset that goes to the store.
    #[must_use]
    pub fn persisted(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            address: self.address().map(|a| a.as_str().to_string()),
            is_simulated: self.simulation_mode,
            bot_status: self.bot_status,
            bot_settings: self.bot_settings.clone(),
            user_tokens: self.user_tokens.clone(),
        }
    }

    /// Reset the transaction counter when `today` differs from the counter's day.
    /// Returns whether a reset happened.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if self.counter_day == today {
            return false;
        }
        self.counter_day = today;
        self.daily_transaction_count = 0;
        true
    }

    /// Transactions still allowed today.
    #[must_use]
    pub fn transactions_remaining(&self) -> u32 {
        self.transaction_cap
            .saturating_sub(self.daily_transaction_count)
    }
}
