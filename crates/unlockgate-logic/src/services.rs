//! Service traits the purchase transaction consumes.
//!
//! Balances, unlock flags, and game progress are owned by the host. The
//! logic only sees them through these traits, so the host decides how they
//! are stored and when they are written to disk.

use thiserror::Error;

use crate::definition::{CurrencyKind, FlagKey};

/// Failure reported by a host service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// A decrement would take a balance below zero.
    #[error("not enough {kind}: have {balance}, need {amount}")]
    Overdraw {
        kind: &'static str,
        balance: u64,
        amount: u64,
    },
    /// A credit would overflow the balance.
    #[error("{kind} balance would overflow")]
    Overflow { kind: &'static str },
    /// The backing store refused a write.
    #[error("write to {target} failed: {detail}")]
    WriteFailed { target: String, detail: String },
}

/// Shared wallet holding spendable currency.
pub trait Wallet {
    fn balance(&self, kind: CurrencyKind) -> u64;

    /// Remove `amount` from a balance. Must fail rather than go negative.
    fn decrement(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError>;

    /// Add `amount` back. Used to undo a decrement when a commit fails.
    fn credit(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError>;

    /// Make the current balances durable.
    fn persist(&mut self) -> Result<(), ServiceError>;
}

/// Persisted boolean flags. A key that was never written reads as `false`.
pub trait FlagStore {
    fn get_flag(&self, key: &FlagKey) -> bool;

    /// Write and persist a flag.
    fn set_flag(&mut self, key: &FlagKey, value: bool) -> Result<(), ServiceError>;
}

/// Read-only view of game progress (highest cleared stage).
pub trait ProgressSource {
    fn current_level(&self) -> u32;
}

/// Groups three separately owned services into one value implementing all
/// three traits, for hosts that do not keep them in a single struct.
pub struct ServiceBundle<'a, W, F, P> {
    pub wallet: &'a mut W,
    pub flags: &'a mut F,
    pub progress: &'a P,
}

impl<'a, W, F, P> ServiceBundle<'a, W, F, P> {
    pub fn new(wallet: &'a mut W, flags: &'a mut F, progress: &'a P) -> Self {
        Self {
            wallet,
            flags,
            progress,
        }
    }
}

impl<W: Wallet, F, P> Wallet for ServiceBundle<'_, W, F, P> {
    fn balance(&self, kind: CurrencyKind) -> u64 {
        self.wallet.balance(kind)
    }

    fn decrement(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError> {
        self.wallet.decrement(kind, amount)
    }

    fn credit(&mut self, kind: CurrencyKind, amount: u64) -> Result<(), ServiceError> {
        self.wallet.credit(kind, amount)
    }

    fn persist(&mut self) -> Result<(), ServiceError> {
        self.wallet.persist()
    }
}

impl<W, F: FlagStore, P> FlagStore for ServiceBundle<'_, W, F, P> {
    fn get_flag(&self, key: &FlagKey) -> bool {
        self.flags.get_flag(key)
    }

    fn set_flag(&mut self, key: &FlagKey, value: bool) -> Result<(), ServiceError> {
        self.flags.set_flag(key, value)
    }
}

impl<W, F, P: ProgressSource> ProgressSource for ServiceBundle<'_, W, F, P> {
    fn current_level(&self) -> u32 {
        self.progress.current_level()
    }
}

/// Fixed progress level, handy for tools and tests.
impl ProgressSource for u32 {
    fn current_level(&self) -> u32 {
        *self
    }
}
