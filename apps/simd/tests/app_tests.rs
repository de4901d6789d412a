#![allow(clippy::unwrap_used, clippy::expect_used)]

use bank::Coin;
use chainkit::{LifecycleError, ValidatorUpdate};
use chainkit_bootstrap::AppConfig;
use chrono::{DateTime, Utc};
use serde_json::json;
use simd::{GenesisDoc, SimApp};

fn genesis_time() -> DateTime<Utc> {
    "2026-01-01T00:00:00Z".parse().unwrap()
}

fn config_with_check_period(period: u64) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.modules.insert(
        "crisis".to_owned(),
        json!({ "config": { "inv_check_period": period } }),
    );
    cfg
}

fn genesis(app: &SimApp) -> GenesisDoc {
    let mut doc = app.default_genesis_doc(genesis_time()).unwrap();
    doc.add_validator("val1", 5_000_000).unwrap();
    doc.add_balance("alice", Coin::new("stake", 10_000_000)).unwrap();
    doc
}

fn started(cfg: &AppConfig) -> (SimApp, Vec<ValidatorUpdate>) {
    let app = SimApp::new(cfg).unwrap();
    let doc = genesis(&app);
    let updates = app.init_chain(&doc).unwrap();
    (app, updates)
}

fn balance(app: &SimApp, address: &str) -> u64 {
    let coin = app
        .query("bank/balance", json!({ "address": address, "denom": "stake" }))
        .unwrap();
    coin["amount"].as_u64().unwrap()
}

#[test]
fn genesis_reports_initial_validator_set() {
    let (app, updates) = started(&AppConfig::default());
    assert_eq!(
        updates,
        vec![ValidatorUpdate {
            pub_key: "val1-consensus-key".to_owned(),
            power: 5,
        }]
    );
    assert_eq!(app.manager().last_height(), Some(0));
    assert_eq!(app.invariants().len(), 3);
}

#[test]
fn identical_genesis_gives_identical_app_hash() {
    let (a, _) = started(&AppConfig::default());
    let (b, _) = started(&AppConfig::default());
    assert_eq!(a.app_hash(), b.app_hash());

    a.step(1).unwrap();
    b.step(1).unwrap();
    assert_eq!(a.app_hash(), b.app_hash());
}

#[test]
fn bank_send_through_router() {
    let (app, _) = started(&AppConfig::default());
    let send = json!({
        "from_address": "alice",
        "to_address": "bob",
        "amount": [{ "denom": "stake", "amount": 250 }],
    });

    let (_, results) = app.step_with_msgs(1, &[("bank/send", send)]).unwrap();
    assert!(results[0].is_ok());
    assert_eq!(balance(&app, "bob"), 250);
    assert_eq!(balance(&app, "alice"), 9_999_750);
}

#[test]
fn failed_message_does_not_halt_the_chain() {
    let (app, _) = started(&AppConfig::default());
    let overdraw = json!({
        "from_address": "bob",
        "to_address": "alice",
        "amount": [{ "denom": "stake", "amount": 1 }],
    });

    let (_, results) = app.step_with_msgs(1, &[("bank/send", overdraw)]).unwrap();
    assert!(results[0].is_err());
    assert!(!app.manager().is_halted());
    app.step(2).unwrap();
}

#[test]
fn delegation_changes_power_at_end_of_block() {
    let (app, _) = started(&AppConfig::default());
    let delegate = json!({
        "delegator": "alice",
        "validator": "val1",
        "amount": { "denom": "stake", "amount": 3_000_000 },
    });

    let (outcome, results) = app
        .step_with_msgs(1, &[("staking/delegate", delegate)])
        .unwrap();
    assert!(results[0].is_ok());
    assert_eq!(
        outcome.end.validator_updates,
        vec![ValidatorUpdate {
            pub_key: "val1-consensus-key".to_owned(),
            power: 8,
        }]
    );
    assert!(
        outcome
            .end
            .events
            .iter()
            .any(|e| e.module == "staking" && e.event.kind == "power_change")
    );

    let quiet = app.step(2).unwrap();
    assert!(quiet.end.validator_updates.is_empty());
}

#[test]
fn verify_invariant_charges_constant_fee() {
    let (app, _) = started(&AppConfig::default());
    let fee_collector = auth::derive_module_address(auth::FEE_COLLECTOR);

    let verify = json!({ "sender": "alice", "route": "bank/total-supply" });
    let unknown = json!({ "sender": "alice", "route": "bank/nope" });
    let (_, results) = app
        .step_with_msgs(
            1,
            &[
                ("crisis/verify_invariant", verify),
                ("crisis/verify_invariant", unknown),
            ],
        )
        .unwrap();

    assert_eq!(results[0].as_ref().unwrap()["route"], "bank/total-supply");
    assert!(results[1].is_err());
    assert_eq!(balance(&app, &fee_collector), 1000);
    assert_eq!(balance(&app, "alice"), 10_000_000 - 1000);
}

#[test]
fn invariants_run_on_check_period() {
    let (app, _) = started(&config_with_check_period(2));
    let checked = |outcome: &simd::StepOutcome| {
        outcome
            .end
            .events
            .iter()
            .any(|e| e.module == "crisis" && e.event.kind == "invariants_checked")
    };

    assert!(!checked(&app.step(1).unwrap()));
    assert!(checked(&app.step(2).unwrap()));
}

#[test]
fn steps_before_genesis_are_refused_without_halting() {
    let app = SimApp::new(&AppConfig::default()).unwrap();
    let err = app.step(1).unwrap_err();
    assert!(matches!(err, LifecycleError::OutOfSequence { .. }));
    assert!(!app.manager().is_halted());
}

#[test]
fn genesis_for_another_chain_is_rejected() {
    let app = SimApp::new(&AppConfig::default()).unwrap();
    let mut doc = genesis(&app);
    doc.chain_id = "other-chain".to_owned();
    assert!(app.validate_genesis(&doc).is_err());
    assert!(app.init_chain(&doc).is_err());
}

#[test]
fn unknown_module_in_configured_ordering_fails_construction() {
    let mut cfg = AppConfig::default();
    cfg.orderings.begin = vec!["bank".to_owned(), "governance".to_owned()];
    let err = SimApp::new(&cfg).err().unwrap();
    assert!(format!("{err:#}").contains("governance"));
}

#[test]
fn export_then_reimport_is_stable() {
    let (app, _) = started(&AppConfig::default());
    let send = json!({
        "from_address": "alice",
        "to_address": "bob",
        "amount": [{ "denom": "stake", "amount": 42 }],
    });
    app.step_with_msgs(1, &[("bank/send", send)]).unwrap();
    app.step(2).unwrap();
    let exported = app.export().unwrap();

    let restarted = SimApp::new(&AppConfig::default()).unwrap();
    restarted.validate_genesis(&exported).unwrap();
    let updates = restarted.init_chain(&exported).unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(balance(&restarted, "bob"), 42);
    assert_eq!(restarted.export().unwrap(), exported);
}
