//! Player profile - the host-side wallet, flag table and progress record.
//!
//! `PlayerProfile` implements every service trait the purchase transaction
//! needs, so an engine can hand a single `&mut PlayerProfile` to `confirm`.
//! Live balances and the persisted balance snapshot are kept apart: only
//! [`Wallet::persist`] moves live values into the snapshot, and only the
//! snapshot is written to a save file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unlockgate_logic::definition::{CurrencyKind, FlagKey};
use unlockgate_logic::eligibility::BalancePair;
use unlockgate_logic::services::{FlagStore, ProgressSource, ServiceError, Wallet};

/// Durable part of a profile, as stored in a save file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub balances: BalancePair,
    pub flags: BTreeMap<FlagKey, bool>,
    pub cleared_level: u32,
}

/// Currency, unlock flags and stage progress for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerProfile {
    balances: BalancePair,
    saved_balances: BalancePair,
    flags: BTreeMap<FlagKey, bool>,
    cleared_level: u32,
}

impl PlayerProfile {
    pub fn new(balances: BalancePair, cleared_level: u32) -> Self {
        Self {
            balances,
            saved_balances: balances,
            flags: BTreeMap::new(),
            cleared_level,
        }
    }

    pub fn from_snapshot(snapshot: ProfileSnapshot) -> Self {
        Self {
            balances: snapshot.balances,
            saved_balances: snapshot.balances,
            flags: snapshot.flags,
            cleared_level: snapshot.cleared_level,
        }
    }

    /// Durable state: persisted balances plus flags and progress.
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            balances: self.saved_balances,
            flags: self.flags.clone(),
            cleared_level: self.cleared_level,
        }
    }

    pub fn balances(&self) -> BalancePair {
        self.balances
    }

    /// Balances as of the last `persist`.
    pub fn saved_balances(&self) -> BalancePair {
        self.saved_balances
    }

    pub fn cleared_level(&self) -> u32 {
        self.cleared_level
    }

    /// Record a stage clear. Progress never goes backwards.
    pub fn record_clear(&mut self, level: u32) {
        if level > self.cleared_level {
            self.cleared_level = level;
        }
    }

    /// Add currency from rewards, clamping at the maximum balance.
    pub fn grant(&mut self, kind: CurrencyKind, amount: u64) {
        let slot = self.slot_mut(kind);
        *slot = slot.saturating_add(amount);
    }

    /// Create the flag entry (as `false`) if it does not exist yet.
    pub fn register_flag(&mut self, key: &FlagKey) {
        self.flags.entry(key.clone()).or_insert(false);
    }

    pub fn flags(&self) -> impl Iterator<Item = (&FlagKey, bool)> {
        self.flags.iter().map(|(k, v)| (k, *v))
    }

    pub fn unlocked_count(&self) -> usize {
        self.flags.values().filter(|v| **v).count()
    }

    fn slot_mut(&mut self, kind: CurrencyKind) -> &mut u64 {
        match kind {
            CurrencyKind::Coin => &mut self.balances.coin,
            CurrencyKind::Gem => &mut self.balances.gem,
        }
    }
}

impl Wallet for PlayerProfile {
    fn balance(&self, kind: CurrencyKind) -> u64 {
        self.balances.get(kind)
    }

    fn decrement(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError> {
        let slot = self.slot_mut(kind);
        *slot = slot.checked_sub(amount).ok_or(ServiceError::Overdraw {
            kind: kind.label(),
            balance: *slot,
            amount,
        })?;
        Ok(())
    }

    fn credit(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError> {
        let slot = self.slot_mut(kind);
        *slot = slot
            .checked_add(amount)
            .ok_or(ServiceError::Overflow { kind: kind.label() })?;
        Ok(())
    }

    fn persist(&mut self) -> Result<(), ServiceError> {
        self.saved_balances = self.balances;
        Ok(())
    }
}

impl FlagStore for PlayerProfile {
    fn get_flag(&self, key: &FlagKey) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    fn set_flag(&mut self, key: &FlagKey, value: bool) -> Result<(), ServiceError> {
        self.flags.insert(key.clone(), value);
        Ok(())
    }
}

impl ProgressSource for PlayerProfile {
    fn current_level(&self) -> u32 {
        self.cleared_level
    }
}
