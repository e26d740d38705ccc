//! UnlockGate Core - host-side unlock engine
//!
//! Wires the pure rules from `unlockgate-logic` to concrete state:
//! - **Catalog**: validated unlock definitions loaded from JSON
//! - **Profile**: the player's wallet, unlock flags and cleared stage
//! - **Persistence**: bincode save files for the profile
//! - **Engine**: one purchase transaction per unlock, ticked by the host
//!
//! # Example
//!
//! ```rust,no_run
//! use unlockgate_core::prelude::*;
//!
//! let catalog = Catalog::load("data/unlocks.json").unwrap();
//! let profile = PlayerProfile::new(BalancePair::new(150, 20), 4);
//! let mut engine = UnlockEngine::new(catalog, profile);
//!
//! let key = FlagKey::new("unlock.frost_blade");
//! if engine.open_panel(&key).unwrap().confirm_enabled {
//!     engine.confirm(&key).unwrap();
//! }
//!
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for (key, event) in engine.drain_events() {
//!         println!("{}: {:?}", key, event);
//!     }
//! }
//! ```

pub mod catalog;
pub mod engine;
pub mod persistence;
pub mod profile;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::catalog::Catalog;
    pub use crate::engine::{EngineError, UnlockEngine};
    pub use crate::profile::PlayerProfile;
    pub use unlockgate_logic::definition::{CurrencyKind, FlagKey, UnlockDefinition};
    pub use unlockgate_logic::eligibility::{BalancePair, ReasonCode};
    pub use unlockgate_logic::transaction::TransactionEvent;
}
