//! Unlock engine - main entry point for a host application
//!
//! Owns the catalog, the player profile and one purchase transaction per
//! unlock. Transactions for different unlocks are independent; the host
//! drives all of their lock windows with a single `update` call per frame.

use std::collections::BTreeMap;

use thiserror::Error;
use unlockgate_logic::definition::{CurrencyKind, FlagKey, UnlockDefinition};
use unlockgate_logic::eligibility::{
    evaluate_with, is_unlocked, BalancePair, EligibilityVerdict,
};
use unlockgate_logic::panel::{FeatureView, PanelView};
use unlockgate_logic::services::{FlagStore, ServiceError, Wallet};
use unlockgate_logic::transaction::{
    PurchaseTransaction, TransactionError, TransactionEvent, TransactionState,
};

use crate::catalog::Catalog;
use crate::persistence::SaveError;
use crate::profile::PlayerProfile;

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no unlock with flag key '{0}'")]
    UnknownUnlock(FlagKey),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("wallet error: {0}")]
    Service(#[from] ServiceError),
}

/// Main unlock engine
pub struct UnlockEngine {
    catalog: Catalog,
    profile: PlayerProfile,
    /// One transaction per unlock, keyed like the catalog
    transactions: BTreeMap<FlagKey, PurchaseTransaction>,
    /// Seconds of host time the engine has been updated for
    elapsed: f64,
}

impl UnlockEngine {
    /// Create an engine; every catalog flag is registered in the profile.
    pub fn new(catalog: Catalog, mut profile: PlayerProfile) -> Self {
        let transactions = Self::build_transactions(&catalog, &mut profile);
        Self {
            catalog,
            profile,
            transactions,
            elapsed: 0.0,
        }
    }

    fn build_transactions(
        catalog: &Catalog,
        profile: &mut PlayerProfile,
    ) -> BTreeMap<FlagKey, PurchaseTransaction> {
        catalog
            .iter()
            .map(|def| {
                profile.register_flag(def.flag_key());
                (
                    def.flag_key().clone(),
                    PurchaseTransaction::new(catalog.lock_duration_secs()),
                )
            })
            .collect()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn definition(&self, key: &FlagKey) -> Result<&UnlockDefinition, EngineError> {
        self.catalog
            .get(key)
            .ok_or_else(|| EngineError::UnknownUnlock(key.clone()))
    }

    pub fn evaluate(&self, key: &FlagKey) -> Result<EligibilityVerdict, EngineError> {
        Ok(evaluate_with(self.definition(key)?, &self.profile))
    }

    /// Build the purchase popup for an unlock.
    pub fn open_panel(&self, key: &FlagKey) -> Result<PanelView, EngineError> {
        let definition = self.definition(key)?;
        let verdict = evaluate_with(definition, &self.profile);

        log::debug!(
            "Panel '{}': flag {}={}, cleared stage {}, balances {:?}, verdict {:?}",
            definition.name(),
            key,
            self.profile.get_flag(key),
            self.profile.cleared_level(),
            self.profile.balances(),
            verdict.reason
        );

        Ok(PanelView::open(definition, verdict))
    }

    /// Buy an unlock. Returns balances after payment.
    pub fn confirm(&mut self, key: &FlagKey) -> Result<BalancePair, EngineError> {
        let definition = self
            .catalog
            .get(key)
            .ok_or_else(|| EngineError::UnknownUnlock(key.clone()))?;
        let tx = self
            .transactions
            .get_mut(key)
            .ok_or_else(|| EngineError::UnknownUnlock(key.clone()))?;
        Ok(tx.confirm(definition, &mut self.profile)?)
    }

    /// Advance every lock window by `delta_seconds`.
    pub fn update(&mut self, delta_seconds: f32) {
        if !delta_seconds.is_finite() || delta_seconds < 0.0 {
            return;
        }
        self.elapsed += delta_seconds as f64;
        for tx in self.transactions.values_mut() {
            tx.update(delta_seconds);
        }
    }

    /// Take queued transaction events from every unlock.
    pub fn drain_events(&mut self) -> Vec<(FlagKey, TransactionEvent)> {
        let mut events = Vec::new();
        for (key, tx) in self.transactions.iter_mut() {
            events.extend(tx.drain_events().into_iter().map(|e| (key.clone(), e)));
        }
        events
    }

    pub fn is_unlocked(&self, key: &FlagKey) -> Result<bool, EngineError> {
        Ok(is_unlocked(self.definition(key)?, &self.profile))
    }

    /// Tile state for an unlock. Stays in its locked form until the lock
    /// window has elapsed, so the reveal lines up with the animation.
    pub fn feature_view(&self, key: &FlagKey) -> Result<FeatureView, EngineError> {
        let definition = self.definition(key)?;
        let revealed = is_unlocked(definition, &self.profile) && self.accepts_input(key)?;
        Ok(FeatureView::for_state(definition, revealed))
    }

    /// Whether the unlock's purchase input is live (not mid-transaction).
    pub fn accepts_input(&self, key: &FlagKey) -> Result<bool, EngineError> {
        self.transactions
            .get(key)
            .map(PurchaseTransaction::accepts_input)
            .ok_or_else(|| EngineError::UnknownUnlock(key.clone()))
    }

    pub fn transaction_state(&self, key: &FlagKey) -> Option<TransactionState> {
        self.transactions.get(key).map(PurchaseTransaction::state)
    }

    /// Reward currency and persist it.
    pub fn grant(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), EngineError> {
        self.profile.grant(kind, amount);
        self.profile.persist()?;
        Ok(())
    }

    /// Record a stage clear (progress never decreases).
    pub fn record_clear(&mut self, level: u32) {
        self.profile.record_clear(level);
    }

    /// Save profile state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), SaveError> {
        crate::persistence::save_profile(writer, &self.profile)
    }

    /// Load profile state from a reader
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let mut profile = crate::persistence::load_profile(reader)?;

        // Pending lock windows belong to the session being replaced.
        self.transactions = Self::build_transactions(&self.catalog, &mut profile);
        self.profile = profile;

        log::info!(
            "Loaded profile: {} of {} unlocks owned, cleared stage {}",
            self.profile.unlocked_count(),
            self.catalog.len(),
            self.profile.cleared_level()
        );
        Ok(())
    }
}
