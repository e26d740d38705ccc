//! Eligibility evaluation — may a feature be bought right now?
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! | Order | Condition | Reason |
//! |-------|-----------|--------|
//! | 1 | flag already set | [`ReasonCode::AlreadyUnlocked`] |
//! | 2 | `coin <= cost_coin` | [`ReasonCode::InsufficientCoin`] |
//! | 3 | `gem <= cost_gem` | [`ReasonCode::InsufficientGem`] |
//! | 4 | `level < required_level` | [`ReasonCode::ProgressTooLow`] |
//!
//! A balance exactly equal to the cost counts as insufficient.
//!
//! ```
//! use unlockgate_logic::definition::UnlockDefinition;
//! use unlockgate_logic::eligibility::{evaluate, BalancePair, ReasonCode};
//!
//! let def = UnlockDefinition::new("Frost Blade", "unlock.frost_blade", 100, 10, 3, "").unwrap();
//! let verdict = evaluate(&def, BalancePair::new(150, 20), 2, false);
//! assert_eq!(verdict.reason, ReasonCode::ProgressTooLow);
//! ```

use serde::{Deserialize, Serialize};

use crate::definition::{CurrencyKind, UnlockDefinition};
use crate::services::{FlagStore, ProgressSource, Wallet};

/// Current spendable amounts of both currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalancePair {
    pub coin: u64,
    pub gem: u64,
}

impl BalancePair {
    pub fn new(coin: u64, gem: u64) -> Self {
        Self { coin, gem }
    }

    /// Read both balances from a wallet.
    pub fn read(wallet: &impl Wallet) -> Self {
        Self {
            coin: wallet.balance(CurrencyKind::Coin),
            gem: wallet.balance(CurrencyKind::Gem),
        }
    }

    pub fn get(&self, kind: CurrencyKind) -> u64 {
        match kind {
            CurrencyKind::Coin => self.coin,
            CurrencyKind::Gem => self.gem,
        }
    }
}

/// Why a purchase is or is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    Ok,
    InsufficientCoin,
    InsufficientGem,
    ProgressTooLow,
    AlreadyUnlocked,
}

impl ReasonCode {
    /// Short user-facing explanation.
    pub fn message(&self) -> &'static str {
        match self {
            ReasonCode::Ok => "Ready to unlock",
            ReasonCode::InsufficientCoin => "Not enough coins",
            ReasonCode::InsufficientGem => "Not enough gems",
            ReasonCode::ProgressTooLow => "Required stage not cleared yet",
            ReasonCode::AlreadyUnlocked => "Already unlocked",
        }
    }
}

/// Outcome of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub allowed: bool,
    pub reason: ReasonCode,
}

impl EligibilityVerdict {
    fn from_reason(reason: ReasonCode) -> Self {
        Self {
            allowed: reason == ReasonCode::Ok,
            reason,
        }
    }
}

/// Decide whether `definition` may be bought with the given balances and
/// progress. `already_unlocked` is the current value of the feature's flag.
pub fn evaluate(
    definition: &UnlockDefinition,
    balances: BalancePair,
    progress_level: u32,
    already_unlocked: bool,
) -> EligibilityVerdict {
    let reason = if already_unlocked {
        ReasonCode::AlreadyUnlocked
    } else if balances.coin <= definition.cost_coin() {
        ReasonCode::InsufficientCoin
    } else if balances.gem <= definition.cost_gem() {
        ReasonCode::InsufficientGem
    } else if progress_level < definition.required_level() {
        ReasonCode::ProgressTooLow
    } else {
        ReasonCode::Ok
    };
    EligibilityVerdict::from_reason(reason)
}

/// [`evaluate`] with inputs read from host services.
pub fn evaluate_with<S>(definition: &UnlockDefinition, services: &S) -> EligibilityVerdict
where
    S: Wallet + FlagStore + ProgressSource,
{
    evaluate(
        definition,
        BalancePair::read(services),
        services.current_level(),
        services.get_flag(definition.flag_key()),
    )
}

/// Flag read-through.
pub fn is_unlocked(definition: &UnlockDefinition, flags: &impl FlagStore) -> bool {
    flags.get_flag(definition.flag_key())
}
