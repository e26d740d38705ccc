//! Pure unlock logic for UnlockGate.
//!
//! This crate contains the purchasable-unlock rules independent of any
//! storage, engine, or UI toolkit. Functions take plain data and service
//! traits and return results, so the same logic runs in a game client, a
//! headless harness, or a unit test.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`definition`] | Static per-feature configuration and its raw (config-file) form |
//! | [`eligibility`] | Pure verdict: may this feature be bought right now, and if not, why |
//! | [`services`] | Wallet / flag store / progress traits consumed by the transaction |
//! | [`transaction`] | Purchase state machine with atomic commit and timed input lock |
//! | [`panel`] | Plain-data view models for the purchase popup and the feature tile |
//!
//! # Example
//!
//! ```
//! use unlockgate_logic::definition::UnlockDefinition;
//! use unlockgate_logic::eligibility::{evaluate, BalancePair, ReasonCode};
//!
//! let def = UnlockDefinition::new("Frost Blade", "unlock.frost_blade", 100, 10, 3, "icons/frost")
//!     .unwrap();
//! let verdict = evaluate(&def, BalancePair::new(150, 20), 4, false);
//! assert!(verdict.allowed);
//!
//! // A balance exactly equal to the cost is not enough.
//! let verdict = evaluate(&def, BalancePair::new(100, 20), 4, false);
//! assert_eq!(verdict.reason, ReasonCode::InsufficientCoin);
//! ```

pub mod definition;
pub mod eligibility;
pub mod panel;
pub mod services;
pub mod transaction;
