//! Integration tests against the shipped catalog in `data/unlocks.json`.
//!
//! Exercises: Catalog::from_json → UnlockEngine → save → load, the way a
//! game session would across a restart.

use unlockgate_core::persistence::{load_profile, save_profile};
use unlockgate_core::prelude::*;

const CATALOG_JSON: &str = include_str!("../../../data/unlocks.json");

fn engine_with(coin: u64, gem: u64, level: u32) -> UnlockEngine {
    let catalog = Catalog::from_json(CATALOG_JSON).expect("shipped catalog must load");
    UnlockEngine::new(catalog, PlayerProfile::new(BalancePair::new(coin, gem), level))
}

#[test]
fn shipped_catalog_is_valid() {
    let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
    assert_eq!(catalog.len(), 5);
    assert_eq!(catalog.lock_duration_secs(), 1.5);
    let aegis = catalog.get(&FlagKey::new("unlock.aegis_shield")).unwrap();
    assert_eq!(aegis.cost_coin(), 250);
    assert_eq!(aegis.cost_gem(), 25);
}

#[test]
fn session_buys_progressively_and_survives_restart() {
    let mut engine = engine_with(2_000, 200, 0);
    let blade = FlagKey::new("unlock.frost_blade");
    let cape = FlagKey::new("unlock.starter_cape");
    let bow = FlagKey::new("unlock.storm_bow");

    assert_eq!(
        engine.open_panel(&blade).unwrap().reason,
        ReasonCode::ProgressTooLow
    );

    engine.confirm(&cape).unwrap();
    engine.record_clear(8);
    engine.confirm(&blade).unwrap();
    engine.confirm(&bow).unwrap();
    assert_eq!(engine.profile().balances(), BalancePair::new(1_300, 150));

    for _ in 0..120 {
        engine.update(1.0 / 60.0);
    }
    let unlocked = engine
        .drain_events()
        .into_iter()
        .filter(|(_, e)| *e == TransactionEvent::Unlocked)
        .count();
    assert_eq!(unlocked, 3);

    let mut save = Vec::new();
    save_profile(&mut save, engine.profile()).unwrap();
    let profile = load_profile(&save[..]).unwrap();

    let mut restarted = engine_with(0, 0, 0);
    let mut buf = Vec::new();
    save_profile(&mut buf, &profile).unwrap();
    restarted.load(&buf[..]).unwrap();

    for key in [&blade, &cape, &bow] {
        assert!(restarted.is_unlocked(key).unwrap());
        assert!(!restarted.open_panel(key).unwrap().confirm_enabled);
    }
    assert!(!restarted
        .is_unlocked(&FlagKey::new("unlock.ember_staff"))
        .unwrap());
    assert_eq!(restarted.profile().balances(), BalancePair::new(1_300, 150));
}

#[test]
fn starter_cape_needs_at_least_one_of_each_currency() {
    let mut engine = engine_with(0, 3, 0);
    let cape = FlagKey::new("unlock.starter_cape");
    assert_eq!(
        engine.open_panel(&cape).unwrap().reason,
        ReasonCode::InsufficientCoin
    );
    engine.grant(CurrencyKind::Coin, 1).unwrap();
    assert!(engine.confirm(&cape).is_ok());
}
