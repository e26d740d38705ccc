//! Purchase transaction — the confirm-to-unlock state machine.
//!
//! ```text
//! Idle ──confirm──▶ Validating ──ok──▶ Committing ──▶ Locked ──update()──▶ Idle
//!                       │                   │
//!                       └── rejected ───────┴── persistence failure ──▶ Idle
//! ```
//!
//! Committing takes both currencies and sets the unlock flag as one unit:
//! if any step fails, the steps already applied are undone before `confirm`
//! returns. Locked is a presentation pause (the unlock animation); it is
//! advanced by [`PurchaseTransaction::update`] from the host's frame loop and
//! cannot be cut short. While not idle the transaction rejects new confirms.
//!
//! Callers observe progress through [`PurchaseTransaction::drain_events`]:
//! each accepted attempt yields `Committed` then `Unlocked`, each rejected one
//! yields `Rejected`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definition::{CurrencyKind, UnlockDefinition};
use crate::eligibility::{evaluate_with, BalancePair, ReasonCode};
use crate::services::{FlagStore, ProgressSource, ServiceError, Wallet};

/// Where the transaction currently is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransactionState {
    Idle,
    Validating,
    Committing,
    /// Input lock after a successful purchase, with seconds left.
    Locked { remaining: f32 },
}

/// Notifications delivered to the presentation layer, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    /// Validation failed; nothing changed.
    Rejected(ReasonCode),
    /// Currency taken and flag set. Carries the balances after payment so
    /// every balance display can refresh.
    Committed { balances: BalancePair },
    /// Lock window elapsed; the feature is usable and input is accepted again.
    Unlocked,
}

/// Why `confirm` did not commit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Not eligible right now. Show the reason and leave the feature locked.
    #[error("unlock not allowed: {}", .reason.message())]
    ValidationFailure { reason: ReasonCode },
    /// A service write failed. Nothing was committed; a retry from idle is safe.
    #[error("unlock could not be committed: {0}")]
    PersistenceFailure(#[from] ServiceError),
    /// A service write failed and undoing the applied steps failed too.
    /// Balances may be left charged without the flag set; do not retry
    /// before the host has reconciled the wallet.
    #[error("unlock failed ({source}) and could not be rolled back: {refund_error}")]
    RollbackFailed {
        source: ServiceError,
        refund_error: ServiceError,
    },
    /// `confirm` while a previous purchase is still in flight.
    #[error("an unlock is already in progress")]
    ReentrancyRejected,
}

impl TransactionError {
    /// True for "not yet eligible", false for a malfunction or misuse.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransactionError::ValidationFailure { .. })
    }
}

/// Drives one unlockable feature through a purchase.
#[derive(Debug, Clone)]
pub struct PurchaseTransaction {
    state: TransactionState,
    lock_duration: f32,
    events: VecDeque<TransactionEvent>,
}

impl PurchaseTransaction {
    /// `lock_duration` is in seconds; negative or non-finite values mean no lock.
    pub fn new(lock_duration: f32) -> Self {
        let lock_duration = if lock_duration.is_finite() {
            lock_duration.max(0.0)
        } else {
            0.0
        };
        Self {
            state: TransactionState::Idle,
            lock_duration,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn lock_duration(&self) -> f32 {
        self.lock_duration
    }

    pub fn is_idle(&self) -> bool {
        self.state == TransactionState::Idle
    }

    /// Whether the feature's own purchase input should be live.
    pub fn accepts_input(&self) -> bool {
        self.is_idle()
    }

    /// Seconds left in the lock window, if locked.
    pub fn lock_remaining(&self) -> Option<f32> {
        match self.state {
            TransactionState::Locked { remaining } => Some(remaining),
            _ => None,
        }
    }

    /// Re-validate and, if allowed, buy `definition`.
    ///
    /// Returns the balances after payment. On success the transaction is
    /// left in `Locked` (or back in `Idle` when the lock duration is zero).
    pub fn confirm<S>(
        &mut self,
        definition: &UnlockDefinition,
        services: &mut S,
    ) -> Result<BalancePair, TransactionError>
    where
        S: Wallet + FlagStore + ProgressSource,
    {
        if !self.is_idle() {
            log::warn!(
                "Confirm for '{}' ignored: transaction is {:?}",
                definition.name(),
                self.state
            );
            return Err(TransactionError::ReentrancyRejected);
        }

        self.state = TransactionState::Validating;
        let verdict = evaluate_with(definition, &*services);
        if !verdict.allowed {
            log::debug!(
                "Unlock of '{}' rejected: {:?}",
                definition.name(),
                verdict.reason
            );
            self.state = TransactionState::Idle;
            self.events.push_back(TransactionEvent::Rejected(verdict.reason));
            return Err(TransactionError::ValidationFailure {
                reason: verdict.reason,
            });
        }

        self.state = TransactionState::Committing;
        match commit(definition, services) {
            Ok(balances) => {
                log::info!(
                    "Unlocked '{}' for {} coin and {} gem",
                    definition.name(),
                    definition.cost_coin(),
                    definition.cost_gem()
                );
                self.events
                    .push_back(TransactionEvent::Committed { balances });
                self.enter_lock();
                Ok(balances)
            }
            Err(e) => {
                log::warn!("Unlock of '{}' failed: {}", definition.name(), e);
                self.state = TransactionState::Idle;
                Err(e)
            }
        }
    }

    /// Advance the lock window by `delta_seconds`.
    pub fn update(&mut self, delta_seconds: f32) {
        if !delta_seconds.is_finite() || delta_seconds < 0.0 {
            return;
        }
        if let TransactionState::Locked { remaining } = self.state {
            let remaining = remaining - delta_seconds;
            if remaining <= 0.0 {
                self.release();
            } else {
                self.state = TransactionState::Locked { remaining };
            }
        }
    }

    /// Take all queued events, oldest first.
    ///
    /// Only attempts that reach validation produce events. Commit failures
    /// and reentrant confirms are reported solely through `confirm`'s return
    /// value and leave the queue untouched.
    pub fn drain_events(&mut self) -> Vec<TransactionEvent> {
        self.events.drain(..).collect()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    fn enter_lock(&mut self) {
        if self.lock_duration <= 0.0 {
            self.release();
        } else {
            self.state = TransactionState::Locked {
                remaining: self.lock_duration,
            };
        }
    }

    fn release(&mut self) {
        self.state = TransactionState::Idle;
        self.events.push_back(TransactionEvent::Unlocked);
    }
}

impl Default for PurchaseTransaction {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Take both costs and set the flag, undoing applied steps on failure.
fn commit<S>(
    definition: &UnlockDefinition,
    services: &mut S,
) -> Result<BalancePair, TransactionError>
where
    S: Wallet + FlagStore,
{
    let charges = [
        (CurrencyKind::Coin, definition.cost_coin()),
        (CurrencyKind::Gem, definition.cost_gem()),
    ];

    for (applied, &(kind, amount)) in charges.iter().enumerate() {
        if let Err(e) = services.decrement(kind, amount) {
            return Err(roll_back(e, refund(services, &charges[..applied])));
        }
    }

    if let Err(e) = services.persist() {
        return Err(roll_back(e, refund(services, &charges)));
    }

    if let Err(e) = services.set_flag(definition.flag_key(), true) {
        // The decremented balances were already made durable above.
        let undone = refund(services, &charges).and_then(|()| services.persist());
        return Err(roll_back(e, undone));
    }

    Ok(BalancePair::read(&*services))
}

/// Credit back every charge, reporting the first failure.
fn refund(wallet: &mut impl Wallet, charges: &[(CurrencyKind, u64)]) -> Result<(), ServiceError> {
    let mut first_err = None;
    for &(kind, amount) in charges {
        if let Err(e) = wallet.credit(kind, amount) {
            log::warn!("Refund of {} {} failed: {}", amount, kind.label(), e);
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

fn roll_back(source: ServiceError, undone: Result<(), ServiceError>) -> TransactionError {
    match undone {
        Ok(()) => TransactionError::PersistenceFailure(source),
        Err(refund_error) => TransactionError::RollbackFailed {
            source,
            refund_error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::FlagKey;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockServices {
        coin: u64,
        gem: u64,
        saved: (u64, u64),
        flags: HashMap<FlagKey, bool>,
        level: u32,
        fail_gem_decrement: bool,
        fail_persist: bool,
        fail_set_flag: bool,
        fail_credit: bool,
        persist_calls: u32,
        /// Persist calls from this one on (1-based) fail.
        fail_persist_from: Option<u32>,
    }

    impl MockServices {
        fn new(coin: u64, gem: u64, level: u32) -> Self {
            Self {
                coin,
                gem,
                saved: (coin, gem),
                level,
                ..Default::default()
            }
        }

        fn balances(&self) -> BalancePair {
            BalancePair::new(self.coin, self.gem)
        }
    }

    impl Wallet for MockServices {
        fn balance(&self, kind: CurrencyKind) -> u64 {
            match kind {
                CurrencyKind::Coin => self.coin,
                CurrencyKind::Gem => self.gem,
            }
        }

        fn decrement(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError> {
            if kind == CurrencyKind::Gem && self.fail_gem_decrement {
                return Err(ServiceError::WriteFailed {
                    target: "gem".into(),
                    detail: "injected".into(),
                });
            }
            let slot = match kind {
                CurrencyKind::Coin => &mut self.coin,
                CurrencyKind::Gem => &mut self.gem,
            };
            *slot = slot.checked_sub(amount).ok_or(ServiceError::Overdraw {
                kind: kind.label(),
                balance: *slot,
                amount,
            })?;
            Ok(())
        }

        fn credit(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError> {
            if self.fail_credit {
                return Err(ServiceError::WriteFailed {
                    target: kind.label().into(),
                    detail: "injected".into(),
                });
            }
            match kind {
                CurrencyKind::Coin => self.coin += amount,
                CurrencyKind::Gem => self.gem += amount,
            }
            Ok(())
        }

        fn persist(&mut self) -> Result<(), ServiceError> {
            self.persist_calls += 1;
            let past_limit = self
                .fail_persist_from
                .is_some_and(|from| self.persist_calls >= from);
            if self.fail_persist || past_limit {
                return Err(ServiceError::WriteFailed {
                    target: "wallet".into(),
                    detail: "injected".into(),
                });
            }
            self.saved = (self.coin, self.gem);
            Ok(())
        }
    }

    impl FlagStore for MockServices {
        fn get_flag(&self, key: &FlagKey) -> bool {
            self.flags.get(key).copied().unwrap_or(false)
        }

        fn set_flag(&mut self, key: &FlagKey, value: bool) -> Result<(), ServiceError> {
            if self.fail_set_flag {
                return Err(ServiceError::WriteFailed {
                    target: key.to_string(),
                    detail: "injected".into(),
                });
            }
            self.flags.insert(key.clone(), value);
            Ok(())
        }
    }

    impl ProgressSource for MockServices {
        fn current_level(&self) -> u32 {
            self.level
        }
    }

    fn blade() -> UnlockDefinition {
        UnlockDefinition::new("Frost Blade", "unlock.frost_blade", 100, 10, 3, "").unwrap()
    }

    #[test]
    fn test_successful_purchase_runs_full_lifecycle() {
        let def = blade();
        let mut svc = MockServices::new(150, 20, 4);
        let mut tx = PurchaseTransaction::new(1.5);

        let after = tx.confirm(&def, &mut svc).unwrap();
        assert_eq!(after, BalancePair::new(50, 10));
        assert_eq!(svc.balances(), BalancePair::new(50, 10));
        assert_eq!(svc.saved, (50, 10));
        assert!(svc.get_flag(def.flag_key()));
        assert_eq!(tx.state(), TransactionState::Locked { remaining: 1.5 });
        assert!(!tx.accepts_input());
        assert_eq!(
            tx.drain_events(),
            vec![TransactionEvent::Committed {
                balances: BalancePair::new(50, 10)
            }]
        );

        tx.update(1.0);
        assert!(!tx.is_idle());
        assert!(!tx.has_pending_events());

        tx.update(0.5);
        assert!(tx.is_idle());
        assert_eq!(tx.drain_events(), vec![TransactionEvent::Unlocked]);
    }

    #[test]
    fn test_exact_balance_rejected_without_mutation() {
        let def = blade();
        let mut svc = MockServices::new(100, 20, 4);
        let mut tx = PurchaseTransaction::new(1.0);

        let err = tx.confirm(&def, &mut svc).unwrap_err();
        assert_eq!(
            err,
            TransactionError::ValidationFailure {
                reason: ReasonCode::InsufficientCoin
            }
        );
        assert!(err.is_recoverable());
        assert_eq!(svc.balances(), BalancePair::new(100, 20));
        assert!(!svc.get_flag(def.flag_key()));
        assert!(tx.is_idle());
        assert_eq!(
            tx.drain_events(),
            vec![TransactionEvent::Rejected(ReasonCode::InsufficientCoin)]
        );
    }

    #[test]
    fn test_progress_too_low_rejected() {
        let mut svc = MockServices::new(150, 20, 2);
        let mut tx = PurchaseTransaction::new(1.0);
        let err = tx.confirm(&blade(), &mut svc).unwrap_err();
        assert_eq!(
            err,
            TransactionError::ValidationFailure {
                reason: ReasonCode::ProgressTooLow
            }
        );
    }

    #[test]
    fn test_reentrant_confirm_rejected_during_lock() {
        let def = blade();
        let mut svc = MockServices::new(500, 50, 4);
        let mut tx = PurchaseTransaction::new(2.0);
        tx.confirm(&def, &mut svc).unwrap();
        let _ = tx.drain_events();

        let before = svc.balances();
        let err = tx.confirm(&def, &mut svc).unwrap_err();
        assert_eq!(err, TransactionError::ReentrancyRejected);
        assert!(!err.is_recoverable());
        assert_eq!(svc.balances(), before);
        assert_eq!(tx.state(), TransactionState::Locked { remaining: 2.0 });
        assert!(!tx.has_pending_events());
    }

    #[test]
    fn test_second_purchase_after_lock_is_already_unlocked() {
        let def = blade();
        let mut svc = MockServices::new(500, 50, 4);
        let mut tx = PurchaseTransaction::new(0.5);
        tx.confirm(&def, &mut svc).unwrap();
        tx.update(1.0);
        let _ = tx.drain_events();

        let err = tx.confirm(&def, &mut svc).unwrap_err();
        assert_eq!(
            err,
            TransactionError::ValidationFailure {
                reason: ReasonCode::AlreadyUnlocked
            }
        );
        assert_eq!(svc.balances(), BalancePair::new(400, 40));
    }

    #[test]
    fn test_zero_lock_duration_unlocks_immediately() {
        let mut svc = MockServices::new(150, 20, 4);
        let mut tx = PurchaseTransaction::new(0.0);
        tx.confirm(&blade(), &mut svc).unwrap();
        assert!(tx.is_idle());
        let events = tx.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], TransactionEvent::Unlocked);
    }

    #[test]
    fn test_invalid_lock_duration_treated_as_zero() {
        assert_eq!(PurchaseTransaction::new(-3.0).lock_duration(), 0.0);
        assert_eq!(PurchaseTransaction::new(f32::NAN).lock_duration(), 0.0);
    }

    #[test]
    fn test_update_ignores_bad_deltas_and_idle_state() {
        let mut tx = PurchaseTransaction::new(1.0);
        tx.update(5.0);
        assert!(tx.is_idle());
        assert!(!tx.has_pending_events());

        let mut svc = MockServices::new(150, 20, 4);
        tx.confirm(&blade(), &mut svc).unwrap();
        tx.update(-10.0);
        tx.update(f32::INFINITY);
        assert_eq!(tx.lock_remaining(), Some(1.0));
    }

    #[test]
    fn test_gem_decrement_failure_refunds_coin() {
        let def = blade();
        let mut svc = MockServices::new(150, 20, 4);
        svc.fail_gem_decrement = true;
        let mut tx = PurchaseTransaction::new(1.0);

        let err = tx.confirm(&def, &mut svc).unwrap_err();
        assert!(matches!(err, TransactionError::PersistenceFailure(_)));
        assert_eq!(svc.balances(), BalancePair::new(150, 20));
        assert!(!svc.get_flag(def.flag_key()));
        assert!(tx.is_idle());
        assert!(!tx.has_pending_events());
    }

    #[test]
    fn test_wallet_persist_failure_leaves_nothing_committed() {
        let def = blade();
        let mut svc = MockServices::new(150, 20, 4);
        svc.fail_persist = true;
        let mut tx = PurchaseTransaction::new(1.0);

        assert!(tx.confirm(&def, &mut svc).is_err());
        assert_eq!(svc.balances(), BalancePair::new(150, 20));
        assert_eq!(svc.saved, (150, 20));
        assert!(!svc.get_flag(def.flag_key()));
    }

    #[test]
    fn test_flag_failure_refunds_and_repersists() {
        let def = blade();
        let mut svc = MockServices::new(150, 20, 4);
        svc.fail_set_flag = true;
        let mut tx = PurchaseTransaction::new(1.0);

        assert!(tx.confirm(&def, &mut svc).is_err());
        assert_eq!(svc.balances(), BalancePair::new(150, 20));
        assert_eq!(svc.saved, (150, 20));
        assert!(!svc.get_flag(def.flag_key()));

        // Retry from idle once the store recovers.
        svc.fail_set_flag = false;
        assert!(tx.confirm(&def, &mut svc).is_ok());
        assert!(svc.get_flag(def.flag_key()));
    }

    #[test]
    fn test_failed_refund_reported_as_rollback_failure() {
        let def = blade();
        let mut svc = MockServices::new(150, 20, 4);
        svc.fail_gem_decrement = true;
        svc.fail_credit = true;
        let mut tx = PurchaseTransaction::new(1.0);

        let err = tx.confirm(&def, &mut svc).unwrap_err();
        match &err {
            TransactionError::RollbackFailed {
                source,
                refund_error,
            } => {
                assert!(matches!(source, ServiceError::WriteFailed { target, .. } if target == "gem"));
                assert!(matches!(refund_error, ServiceError::WriteFailed { target, .. } if target == "coin"));
            }
            other => panic!("expected rollback failure, got {:?}", other),
        }
        assert!(!err.is_recoverable());
        // The coin charge could not be undone and the caller is told so.
        assert_eq!(svc.balances(), BalancePair::new(50, 20));
        assert!(!svc.get_flag(def.flag_key()));
        assert!(tx.is_idle());
        assert!(!tx.has_pending_events());
    }

    #[test]
    fn test_failed_repersist_after_flag_failure_reported() {
        let def = blade();
        let mut svc = MockServices::new(150, 20, 4);
        svc.fail_set_flag = true;
        svc.fail_persist_from = Some(2);
        let mut tx = PurchaseTransaction::new(1.0);

        let err = tx.confirm(&def, &mut svc).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::RollbackFailed {
                source: ServiceError::WriteFailed { .. },
                refund_error: ServiceError::WriteFailed { .. },
            }
        ));
        assert_eq!(svc.persist_calls, 2);
        // Live balances were refunded, the durable copy still holds the charge.
        assert_eq!(svc.balances(), BalancePair::new(150, 20));
        assert_eq!(svc.saved, (50, 10));
        assert!(!svc.get_flag(def.flag_key()));
    }

    #[test]
    fn test_clean_rollback_stays_persistence_failure() {
        let mut svc = MockServices::new(150, 20, 4);
        svc.fail_gem_decrement = true;
        let mut tx = PurchaseTransaction::new(1.0);
        assert!(matches!(
            tx.confirm(&blade(), &mut svc),
            Err(TransactionError::PersistenceFailure(_))
        ));
    }

    #[test]
    fn test_transactions_for_different_features_interleave() {
        let blade = blade();
        let shield = UnlockDefinition::new("Aegis", "unlock.aegis", 50, 5, 1, "").unwrap();
        let mut svc = MockServices::new(1_000, 100, 5);
        let mut tx_blade = PurchaseTransaction::new(1.0);
        let mut tx_shield = PurchaseTransaction::new(1.0);

        tx_blade.confirm(&blade, &mut svc).unwrap();
        tx_shield.confirm(&shield, &mut svc).unwrap();
        assert_eq!(svc.balances(), BalancePair::new(850, 85));

        tx_blade.update(1.0);
        assert!(tx_blade.is_idle());
        assert!(!tx_shield.is_idle());
    }

    #[test]
    fn test_unlock_survives_balance_and_progress_changes() {
        let def = blade();
        let mut svc = MockServices::new(150, 20, 4);
        let mut tx = PurchaseTransaction::new(0.0);
        tx.confirm(&def, &mut svc).unwrap();

        svc.coin = 0;
        svc.gem = 0;
        svc.level = 0;
        assert!(crate::eligibility::is_unlocked(&def, &svc));
        assert_eq!(
            evaluate_with(&def, &svc).reason,
            ReasonCode::AlreadyUnlocked
        );
    }
}
