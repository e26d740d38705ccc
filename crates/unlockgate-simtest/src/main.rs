//! UnlockGate Headless Harness
//!
//! Validates the shipped unlock catalog and the purchase state machine
//! entirely in-process — no UI, no disk writes, no rendering.
//!
//! Usage:
//!   cargo run -p unlockgate-simtest
//!   cargo run -p unlockgate-simtest -- --verbose

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use unlockgate_core::catalog::Catalog;
use unlockgate_core::engine::{EngineError, UnlockEngine};
use unlockgate_core::persistence::{load_profile, save_profile};
use unlockgate_core::profile::PlayerProfile;
use unlockgate_logic::definition::{CurrencyKind, FlagKey, UnlockDefinition};
use unlockgate_logic::eligibility::{evaluate, BalancePair, ReasonCode};
use unlockgate_logic::transaction::{TransactionError, TransactionEvent};

// ── Catalog (same JSON the game ships) ──────────────────────────────────
const CATALOG_JSON: &str = include_str!("../../../data/unlocks.json");

/// Seed for the randomized sweep, fixed so failures reproduce.
const SWEEP_SEED: u64 = 0x5EED_2026;
const SWEEP_ROUNDS: usize = 2_000;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== UnlockGate Harness ===\n");

    let catalog = match Catalog::from_json(CATALOG_JSON) {
        Ok(c) => c,
        Err(e) => {
            println!("  ✗ catalog_parse: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Catalog data
    results.extend(validate_catalog(&catalog, verbose));

    // 2. Eligibility precedence per definition
    results.extend(validate_eligibility(&catalog, verbose));

    // 3. Scripted purchase scenarios
    results.extend(validate_purchase_scenarios(&catalog, verbose));

    // 4. Randomized invariant sweep
    results.extend(validate_random_sessions(&catalog, verbose));

    // 5. Save / load
    results.extend(validate_persistence(&catalog, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Catalog ---");
    let mut results = Vec::new();

    results.push(check(
        "catalog_not_empty",
        !catalog.is_empty(),
        format!("{} unlocks", catalog.len()),
    ));

    results.push(check(
        "lock_duration_sane",
        (0.0..=10.0).contains(&catalog.lock_duration_secs()),
        format!("{:.2}s", catalog.lock_duration_secs()),
    ));

    let bad_keys: Vec<&str> = catalog
        .iter()
        .map(|d| d.flag_key().as_str())
        .filter(|k| !k.starts_with("unlock."))
        .collect();
    results.push(check(
        "flag_keys_namespaced",
        bad_keys.is_empty(),
        if bad_keys.is_empty() {
            "all keys start with 'unlock.'".into()
        } else {
            format!("unexpected keys: {:?}", bad_keys)
        },
    ));

    // Costs should not go down as required stage goes up.
    let mut by_level: Vec<&UnlockDefinition> = catalog.iter().collect();
    by_level.sort_by_key(|d| d.required_level());
    let monotonic = by_level
        .windows(2)
        .all(|w| w[0].cost_coin() <= w[1].cost_coin() && w[0].cost_gem() <= w[1].cost_gem());
    results.push(check(
        "costs_scale_with_stage",
        monotonic,
        "coin/gem costs non-decreasing by required stage".into(),
    ));

    if verbose {
        for d in catalog.iter() {
            println!(
                "    {:<16} stage {:>2}  {:>5} coin  {:>3} gem  [{}]",
                d.name(),
                d.required_level(),
                d.cost_coin(),
                d.cost_gem(),
                d.flag_key()
            );
        }
    }

    results
}

// ── 2. Eligibility ──────────────────────────────────────────────────────

fn validate_eligibility(catalog: &Catalog, _verbose: bool) -> Vec<TestResult> {
    println!("--- Eligibility ---");
    let mut results = Vec::new();

    for d in catalog.iter() {
        let rich = BalancePair::new(d.cost_coin() + 1, d.cost_gem() + 1);
        let level = d.required_level();

        let ok = evaluate(d, rich, level, false).reason == ReasonCode::Ok;
        let exact_coin = evaluate(d, BalancePair::new(d.cost_coin(), rich.gem), level, false)
            .reason
            == ReasonCode::InsufficientCoin;
        let exact_gem = evaluate(d, BalancePair::new(rich.coin, d.cost_gem()), level, false)
            .reason
            == ReasonCode::InsufficientGem;
        let owned = evaluate(d, rich, level, true).reason == ReasonCode::AlreadyUnlocked;
        let low = level == 0
            || evaluate(d, rich, level - 1, false).reason == ReasonCode::ProgressTooLow;

        results.push(check(
            &format!("eligibility_{}", d.flag_key()),
            ok && exact_coin && exact_gem && owned && low,
            format!(
                "ok={} exact_coin={} exact_gem={} owned={} low_stage={}",
                ok, exact_coin, exact_gem, owned, low
            ),
        ));
    }

    results
}

// ── 3. Purchase scenarios ───────────────────────────────────────────────

fn validate_purchase_scenarios(catalog: &Catalog, _verbose: bool) -> Vec<TestResult> {
    println!("--- Purchase Scenarios ---");
    let mut results = Vec::new();
    let blade = FlagKey::new("unlock.frost_blade");

    // Eligible purchase
    let mut engine = UnlockEngine::new(
        catalog.clone(),
        PlayerProfile::new(BalancePair::new(150, 20), 4),
    );
    let committed = engine.confirm(&blade);
    results.push(check(
        "scenario_ok_commits",
        matches!(committed, Ok(b) if b == BalancePair::new(50, 10))
            && engine.is_unlocked(&blade).unwrap_or(false),
        format!("{:?}", committed),
    ));

    let reentry = engine.confirm(&blade);
    results.push(check(
        "scenario_reentry_rejected",
        matches!(
            reentry,
            Err(EngineError::Transaction(TransactionError::ReentrancyRejected))
        ) && engine.profile().balances() == BalancePair::new(50, 10),
        format!("{:?}", reentry.map(|_| ())),
    ));

    let frames = run_until_input(&mut engine, &blade);
    let expected = (catalog.lock_duration_secs() * 60.0).round() as u32;
    results.push(check(
        "scenario_lock_window_timing",
        frames.abs_diff(expected) <= 1,
        format!("{} frames at 60 FPS (expected ~{})", frames, expected),
    ));

    let events: Vec<TransactionEvent> = engine.drain_events().into_iter().map(|(_, e)| e).collect();
    results.push(check(
        "scenario_event_sequence",
        events
            == vec![
                TransactionEvent::Committed {
                    balances: BalancePair::new(50, 10),
                },
                TransactionEvent::Unlocked,
            ],
        format!("{:?}", events),
    ));

    // Exact balance
    let mut engine = UnlockEngine::new(
        catalog.clone(),
        PlayerProfile::new(BalancePair::new(100, 20), 4),
    );
    let rejected = engine.confirm(&blade);
    results.push(check(
        "scenario_exact_coin_rejected",
        matches!(
            rejected,
            Err(EngineError::Transaction(TransactionError::ValidationFailure {
                reason: ReasonCode::InsufficientCoin
            }))
        ) && engine.profile().balances() == BalancePair::new(100, 20),
        format!("{:?}", rejected.map(|_| ())),
    ));

    // Stage not cleared
    let mut engine = UnlockEngine::new(
        catalog.clone(),
        PlayerProfile::new(BalancePair::new(150, 20), 2),
    );
    let reason = engine.open_panel(&blade).map(|p| p.reason);
    results.push(check(
        "scenario_progress_too_low",
        matches!(reason, Ok(ReasonCode::ProgressTooLow)) && engine.confirm(&blade).is_err(),
        format!("{:?}", reason),
    ));

    results
}

fn run_until_input(engine: &mut UnlockEngine, key: &FlagKey) -> u32 {
    let mut frames = 0;
    while !engine.accepts_input(key).unwrap_or(true) && frames < 10_000 {
        engine.update(1.0 / 60.0);
        frames += 1;
    }
    frames
}

// ── 4. Randomized sessions ──────────────────────────────────────────────

fn validate_random_sessions(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Randomized Sessions ---");
    let mut rng = StdRng::seed_from_u64(SWEEP_SEED);
    let keys: Vec<FlagKey> = catalog.iter().map(|d| d.flag_key().clone()).collect();

    let mut engine = UnlockEngine::new(catalog.clone(), PlayerProfile::default());
    let mut violations = Vec::new();
    let mut purchases = 0;
    let mut rejections = 0;

    for round in 0..SWEEP_ROUNDS {
        match rng.gen_range(0..4) {
            0 => {
                let coin = rng.gen_range(0..400);
                let gem = rng.gen_range(0..40);
                for (kind, amount) in [(CurrencyKind::Coin, coin), (CurrencyKind::Gem, gem)] {
                    if let Err(e) = engine.grant(kind, amount) {
                        violations.push(format!(
                            "round {}: grant of {} {} failed: {}",
                            round,
                            amount,
                            kind.label(),
                            e
                        ));
                    }
                }
            }
            1 => engine.record_clear(rng.gen_range(0..15)),
            2 => engine.update(rng.gen_range(0.0..0.5)),
            _ => {
                let key = &keys[rng.gen_range(0..keys.len())];
                let before = engine.profile().balances();
                let was_unlocked = engine.is_unlocked(key).unwrap_or(false);
                let Ok(def) = engine.definition(key).cloned() else {
                    continue;
                };

                match engine.confirm(key) {
                    Ok(after) => {
                        purchases += 1;
                        let paid = before.coin - after.coin == def.cost_coin()
                            && before.gem - after.gem == def.cost_gem();
                        if was_unlocked || !paid || !engine.is_unlocked(key).unwrap_or(false) {
                            violations.push(format!("round {}: bad commit for {}", round, key));
                        }
                    }
                    Err(_) => {
                        rejections += 1;
                        let unchanged = engine.profile().balances() == before
                            && engine.is_unlocked(key).unwrap_or(false) == was_unlocked;
                        if !unchanged {
                            violations.push(format!("round {}: rejected {} mutated state", round, key));
                        }
                    }
                }
            }
        }

        // Saved balances only lag live ones inside a confirm, never between calls.
        if engine.profile().balances() != engine.profile().saved_balances() {
            violations.push(format!("round {}: unpersisted balances", round));
        }
    }

    if verbose {
        println!(
            "    {} rounds: {} purchases, {} rejections, {} owned",
            SWEEP_ROUNDS,
            purchases,
            rejections,
            engine.profile().unlocked_count()
        );
    }

    vec![
        check(
            "random_no_violations",
            violations.is_empty(),
            if violations.is_empty() {
                format!("{} rounds clean", SWEEP_ROUNDS)
            } else {
                violations.join("; ")
            },
        ),
        check(
            "random_made_purchases",
            purchases > 0,
            format!("{} purchases", purchases),
        ),
    ]
}

// ── 5. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(catalog: &Catalog, _verbose: bool) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let mut engine = UnlockEngine::new(
        catalog.clone(),
        PlayerProfile::new(BalancePair::new(5_000, 500), 20),
    );
    for d in catalog.iter() {
        let _ = engine.confirm(d.flag_key());
    }

    let mut buf = Vec::new();
    let saved = save_profile(&mut buf, engine.profile());
    let loaded = load_profile(&buf[..]);

    results.push(check(
        "persistence_roundtrip",
        saved.is_ok() && matches!(&loaded, Ok(p) if p == engine.profile()),
        format!("{} bytes", buf.len()),
    ));

    let all_owned = loaded
        .as_ref()
        .map(|p| p.unlocked_count() == catalog.len())
        .unwrap_or(false);
    results.push(check(
        "persistence_all_unlocked",
        all_owned,
        format!("{} of {} owned after reload", engine.profile().unlocked_count(), catalog.len()),
    ));

    results
}
