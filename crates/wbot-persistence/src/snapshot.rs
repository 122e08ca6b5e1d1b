//! Persisted slot schema.
//!
//! Only whitelisted fields live here. Loading flags, in-flight errors,
//! health reports and pending decisions never reach the store. Every
//! field defaults when missing so blobs written by older builds load.

use serde::{Deserialize, Serialize};
use wbot_core::{BotSettings, BotStatus, UserToken};

/// Full slot contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSnapshot {
    /// Connected wallet address (raw, revalidated on restore).
    pub address: Option<String>,
    /// Simulation mode flag.
    pub is_simulated: bool,
    pub bot_status: BotStatus,
    pub bot_settings: BotSettings,
    pub user_tokens: Vec<UserToken>,
}

/// Partial update of the slot; `None` leaves the stored field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotPatch {
    /// `Some(None)` clears the stored address.
    pub address: Option<Option<String>>,
    pub is_simulated: Option<bool>,
    pub bot_status: Option<BotStatus>,
    pub bot_settings: Option<BotSettings>,
    pub user_tokens: Option<Vec<UserToken>>,
}

impl SnapshotPatch {
    #[must_use]
    pub fn address(address: Option<String>) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn simulated(is_simulated: bool) -> Self {
        Self {
            is_simulated: Some(is_simulated),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn bot_status(status: BotStatus) -> Self {
        Self {
            bot_status: Some(status),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn bot_settings(settings: BotSettings) -> Self {
        Self {
            bot_settings: Some(settings),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn user_tokens(tokens: Vec<UserToken>) -> Self {
        Self {
            user_tokens: Some(tokens),
            ..Default::default()
        }
    }

    /// Patch that rewrites every field from `snapshot`.
    #[must_use]
    pub fn full(snapshot: PersistedSnapshot) -> Self {
        Self {
            address: Some(snapshot.address),
            is_simulated: Some(snapshot.is_simulated),
            bot_status: Some(snapshot.bot_status),
            bot_settings: Some(snapshot.bot_settings),
            user_tokens: Some(snapshot.user_tokens),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a later patch into this one; later fields win.
    pub fn merge(&mut self, later: SnapshotPatch) {
        if later.address.is_some() {
            self.address = later.address;
        }
        if later.is_simulated.is_some() {
            self.is_simulated = later.is_simulated;
        }
        if later.bot_status.is_some() {
            self.bot_status = later.bot_status;
        }
        if later.bot_settings.is_some() {
            self.bot_settings = later.bot_settings;
        }
        if later.user_tokens.is_some() {
            self.user_tokens = later.user_tokens;
        }
    }

    /// Write the patched fields into `snapshot`.
    pub fn apply_to(self, snapshot: &mut PersistedSnapshot) {
        if let Some(address) = self.address {
            snapshot.address = address;
        }
        if let Some(is_simulated) = self.is_simulated {
            snapshot.is_simulated = is_simulated;
        }
        if let Some(status) = self.bot_status {
            snapshot.bot_status = status;
        }
        if let Some(settings) = self.bot_settings {
            snapshot.bot_settings = settings;
        }
        if let Some(tokens) = self.user_tokens {
            snapshot.user_tokens = tokens;
        }
    }
}
