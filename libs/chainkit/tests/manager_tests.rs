#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Lifecycle tests for the manager driven through the public API:
//! phase ordering, fail-fast behaviour, genesis scoping, service and
//! invariant registration, and keeper wiring through the registry builder.

use std::sync::{Arc, Mutex};

use chainkit::{
    BeginPhaseModule, BeginPhaseRequest, BuildCtx, ConfigurationError, EndPhaseModule,
    EndPhaseRequest, EndPhaseResult, GenesisCodec, GenesisDecodeError, GenesisModule,
    GenesisState, InvariantCheck, InvariantModule, InvariantRegistry, JsonCodec, LifecycleError,
    Manager, MemKvStore, ModuleEntry, ModuleFactory, ModuleRouter, PhaseExecutionError,
    PhaseOrderings, PhaseResult, RegistryBuilder, ServiceModule, ServiceRouter, StepCtx,
    StoreAllocator, ValidatorUpdate, config::MapConfigProvider, contracts::GenesisFailure,
};
use chrono::Utc;
use serde_json::json;

// Test tracking infrastructure
type CallTracker = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Default)]
struct TestModule {
    name: &'static str,
    calls: CallTracker,
    fail_begin: bool,
    fail_end: bool,
    genesis_updates: Vec<ValidatorUpdate>,
    end_updates: Vec<ValidatorUpdate>,
    invariants: Vec<(&'static str, bool)>,
}

impl TestModule {
    fn new(name: &'static str, calls: &CallTracker) -> Self {
        Self {
            name,
            calls: calls.clone(),
            ..Self::default()
        }
    }

    fn fail_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    fn fail_end(mut self) -> Self {
        self.fail_end = true;
        self
    }

    fn with_genesis_updates(mut self, updates: Vec<ValidatorUpdate>) -> Self {
        self.genesis_updates = updates;
        self
    }

    fn with_end_updates(mut self, updates: Vec<ValidatorUpdate>) -> Self {
        self.end_updates = updates;
        self
    }

    fn with_invariant(mut self, name: &'static str, broken: bool) -> Self {
        self.invariants.push((name, broken));
        self
    }

    fn record(&self, what: impl std::fmt::Display) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}.{what}", self.name));
    }

    /// Entry exposing every capability.
    fn entry(self) -> ModuleEntry {
        let name = self.name;
        let m = Arc::new(self);
        ModuleEntry::new(name)
            .with_genesis(m.clone())
            .with_begin(m.clone())
            .with_end(m.clone())
            .with_services(m.clone())
            .with_invariants(m)
    }
}

impl GenesisModule for TestModule {
    fn init_genesis(
        &self,
        _ctx: &StepCtx,
        codec: &dyn GenesisCodec,
        slice: Option<&serde_json::Value>,
    ) -> Result<Vec<ValidatorUpdate>, GenesisFailure> {
        let decoded = codec.decode_slice(self.name, slice)?;
        let payload = decoded.map_or_else(|| "<default>".to_owned(), |v| v.to_string());
        self.record(format!("genesis({payload})"));
        Ok(self.genesis_updates.clone())
    }

    fn validate_genesis(
        &self,
        codec: &dyn GenesisCodec,
        slice: Option<&serde_json::Value>,
    ) -> Result<(), GenesisFailure> {
        codec.decode_slice(self.name, slice)?;
        Ok(())
    }

    fn default_genesis(&self) -> anyhow::Result<serde_json::Value> {
        Ok(json!({}))
    }

    fn export_genesis(&self, _ctx: &StepCtx) -> anyhow::Result<serde_json::Value> {
        Ok(json!({}))
    }
}

impl BeginPhaseModule for TestModule {
    fn begin_phase(&self, _ctx: &StepCtx, req: &BeginPhaseRequest) -> anyhow::Result<PhaseResult> {
        self.record(format!("begin({})", req.height));
        if self.fail_begin {
            anyhow::bail!("{} refuses to begin", self.name);
        }
        Ok(PhaseResult::default())
    }
}

impl EndPhaseModule for TestModule {
    fn end_phase(&self, _ctx: &StepCtx, req: &EndPhaseRequest) -> anyhow::Result<EndPhaseResult> {
        self.record(format!("end({})", req.height));
        if self.fail_end {
            anyhow::bail!("{} refuses to end", self.name);
        }
        Ok(EndPhaseResult {
            events: Vec::new(),
            validator_updates: self.end_updates.clone(),
        })
    }
}

impl ServiceModule for TestModule {
    fn register_services(&self, router: &mut ModuleRouter<'_>) -> anyhow::Result<()> {
        self.record("services");
        let name = self.name;
        router.query("name", move |_: serde_json::Value| Ok(name))?;
        Ok(())
    }
}

impl InvariantModule for TestModule {
    fn register_invariants(&self, registry: &InvariantRegistry) -> anyhow::Result<()> {
        for &(invariant, broken) in &self.invariants {
            registry.register(self.name, invariant, move |_| {
                if broken {
                    InvariantCheck::broken(format!("{invariant} is off"))
                } else {
                    InvariantCheck::ok(format!("{invariant} holds"))
                }
            })?;
        }
        Ok(())
    }
}

/// Passes any slice through untouched, including scalars.
struct PassthroughCodec;

impl GenesisCodec for PassthroughCodec {
    fn decode_state(&self, bytes: &[u8]) -> Result<GenesisState, GenesisDecodeError> {
        JsonCodec.decode_state(bytes)
    }

    fn encode_state(&self, state: &GenesisState) -> Result<Vec<u8>, GenesisDecodeError> {
        JsonCodec.encode_state(state)
    }

    fn decode_slice(
        &self,
        _module: &str,
        slice: Option<&serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, GenesisDecodeError> {
        Ok(slice.cloned())
    }
}

fn ctx(height: u64) -> StepCtx {
    StepCtx::new("test-chain", height, Utc::now())
}

fn begin_req(height: u64) -> BeginPhaseRequest {
    BeginPhaseRequest {
        height,
        time: Utc::now(),
        proposer: None,
    }
}

fn run_genesis(manager: &Manager) {
    manager
        .init_genesis(&ctx(0), &JsonCodec, &GenesisState::new())
        .unwrap();
}

fn calls_of(calls: &CallTracker, suffix: &str) -> Vec<String> {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.contains(suffix))
        .cloned()
        .collect()
}

fn update(pub_key: &str, power: i64) -> ValidatorUpdate {
    ValidatorUpdate {
        pub_key: pub_key.to_owned(),
        power,
    }
}

#[test]
fn register_services_runs_once_per_capable_module_in_construction_order() {
    let calls = CallTracker::default();
    let without_services = ModuleEntry::new("silent");
    let manager = Manager::new(
        vec![
            TestModule::new("c", &calls).entry(),
            without_services,
            TestModule::new("a", &calls).entry(),
            TestModule::new("b", &calls).entry(),
        ],
        // Phase orders must not influence service registration.
        &PhaseOrderings::uniform(&["b", "a", "c"]),
    )
    .unwrap();

    let mut router = ServiceRouter::new();
    manager.register_services(&mut router).unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["c.services", "a.services", "b.services"]
    );
    assert_eq!(router.query("a/name", json!(null)).unwrap(), json!("a"));

    let err = manager.register_services(&mut router).unwrap_err();
    assert!(matches!(err, ConfigurationError::ServicesAlreadyRegistered));
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[test]
fn scenario_genesis_runs_listed_modules_with_their_slices() {
    let calls = CallTracker::default();
    let genesis = GenesisState::new().with("A", json!("x")).with("B", json!("y"));

    let manager = Manager::new(
        vec![
            TestModule::new("A", &calls).entry(),
            TestModule::new("B", &calls).entry(),
        ],
        &PhaseOrderings::default().genesis(&["A", "B"]),
    )
    .unwrap();
    manager
        .init_genesis(&ctx(0), &PassthroughCodec, &genesis)
        .unwrap();
    assert_eq!(
        *calls.lock().unwrap(),
        vec![r#"A.genesis("x")"#, r#"B.genesis("y")"#]
    );
}

#[test]
fn scenario_module_outside_genesis_order_is_never_initialized() {
    let calls = CallTracker::default();
    let genesis = GenesisState::new().with("A", json!("x")).with("B", json!("y"));

    let manager = Manager::new(
        vec![
            TestModule::new("A", &calls).entry(),
            TestModule::new("B", &calls).entry(),
        ],
        &PhaseOrderings::default().genesis(&["A"]),
    )
    .unwrap();
    manager
        .init_genesis(&ctx(0), &PassthroughCodec, &genesis)
        .unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![r#"A.genesis("x")"#]);
}

#[test]
fn missing_genesis_slice_falls_back_to_default() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![TestModule::new("A", &calls).entry()],
        &PhaseOrderings::uniform(&["A"]),
    )
    .unwrap();
    run_genesis(&manager);
    assert_eq!(*calls.lock().unwrap(), vec!["A.genesis(<default>)"]);
}

#[test]
fn second_init_genesis_is_a_configuration_error() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![TestModule::new("A", &calls).entry()],
        &PhaseOrderings::uniform(&["A"]),
    )
    .unwrap();
    run_genesis(&manager);

    let err = manager
        .init_genesis(&ctx(0), &JsonCodec, &GenesisState::new())
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Configuration(ConfigurationError::GenesisAlreadyInitialized)
    ));
    assert_eq!(calls_of(&calls, "genesis").len(), 1);
    assert!(!manager.is_halted());
}

#[test]
fn malformed_genesis_slice_is_a_decode_error_and_stops_later_modules() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![
            TestModule::new("A", &calls).entry(),
            TestModule::new("B", &calls).entry(),
        ],
        &PhaseOrderings::uniform(&["A", "B"]),
    )
    .unwrap();

    let genesis = GenesisState::new().with("A", json!([1, 2, 3]));
    let err = manager
        .init_genesis(&ctx(0), &JsonCodec, &genesis)
        .unwrap_err();
    assert!(matches!(err, LifecycleError::GenesisDecode(ref e) if e.module == "A"));
    assert!(calls.lock().unwrap().is_empty());
    assert!(manager.is_halted());
}

#[test]
fn begin_follows_configured_order_exactly_once_per_step() {
    for order in [["a", "b", "c"], ["c", "a", "b"], ["b", "c", "a"]] {
        let calls = CallTracker::default();
        let manager = Manager::new(
            vec![
                TestModule::new("a", &calls).entry(),
                TestModule::new("b", &calls).entry(),
                TestModule::new("c", &calls).entry(),
            ],
            &PhaseOrderings::uniform(&["a", "b", "c"]).begin(&order),
        )
        .unwrap();
        run_genesis(&manager);

        for height in 1..=2 {
            manager.begin_phase(&ctx(height), &begin_req(height)).unwrap();
            manager
                .end_phase(&ctx(height), &EndPhaseRequest { height })
                .unwrap();
        }

        let expected: Vec<String> = (1..=2)
            .flat_map(|h| order.iter().map(move |m| format!("{m}.begin({h})")))
            .collect();
        assert_eq!(calls_of(&calls, ".begin("), expected, "order {order:?}");
    }
}

#[test]
fn begin_failure_stops_later_modules() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![
            TestModule::new("a", &calls).entry(),
            TestModule::new("b", &calls).fail_begin().entry(),
            TestModule::new("c", &calls).entry(),
        ],
        &PhaseOrderings::uniform(&["a", "b", "c"]),
    )
    .unwrap();
    run_genesis(&manager);

    let err = manager.begin_phase(&ctx(1), &begin_req(1)).unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::PhaseExecution(PhaseExecutionError::Module { ref module, .. }) if module == "b"
    ));
    assert_eq!(calls_of(&calls, ".begin("), vec!["a.begin(1)", "b.begin(1)"]);
}

#[test]
fn end_failure_stops_later_modules_and_returns_no_updates() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![
            TestModule::new("a", &calls)
                .with_end_updates(vec![update("v1", 5)])
                .entry(),
            TestModule::new("b", &calls).fail_end().entry(),
            TestModule::new("c", &calls).entry(),
        ],
        &PhaseOrderings::uniform(&["a", "b", "c"]),
    )
    .unwrap();
    run_genesis(&manager);
    manager.begin_phase(&ctx(1), &begin_req(1)).unwrap();

    assert!(
        manager
            .end_phase(&ctx(1), &EndPhaseRequest { height: 1 })
            .is_err()
    );
    assert_eq!(calls_of(&calls, ".end("), vec!["a.end(1)", "b.end(1)"]);
    assert!(manager.is_halted());
}

#[test]
fn scenario_begin_order_independent_of_dependency_order() {
    struct Factory {
        name: &'static str,
        deps: &'static [&'static str],
        calls: CallTracker,
    }

    impl ModuleFactory for Factory {
        fn name(&self) -> &'static str {
            self.name
        }

        fn dependencies(&self) -> &'static [&'static str] {
            self.deps
        }

        fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
            assert_eq!(ctx.store(self.name)?.namespace(), self.name);
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}.build", self.name));
            Ok(TestModule::new(self.name, &self.calls).entry())
        }
    }

    let calls = CallTracker::default();
    let registry = RegistryBuilder::new()
        .with(Arc::new(Factory {
            name: "B",
            deps: &["A"],
            calls: calls.clone(),
        }))
        .with(Arc::new(Factory {
            name: "A",
            deps: &[],
            calls: calls.clone(),
        }))
        .build_topo_sorted(
            &StoreAllocator::new(Arc::new(MemKvStore::new())),
            Arc::new(MapConfigProvider::new()),
        )
        .unwrap();
    assert_eq!(registry.names(), vec!["A", "B"]);

    let manager = Manager::new(
        registry.into_modules(),
        &PhaseOrderings::uniform(&["A", "B"]).begin(&["B", "A"]),
    )
    .unwrap();
    run_genesis(&manager);
    manager.begin_phase(&ctx(1), &begin_req(1)).unwrap();

    assert_eq!(calls_of(&calls, ".build"), vec!["A.build", "B.build"]);
    assert_eq!(calls_of(&calls, ".begin("), vec!["B.begin(1)", "A.begin(1)"]);
}

#[test]
fn run_all_reports_every_invariant_in_registration_order() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![
            TestModule::new("bank", &calls)
                .with_invariant("supply", true)
                .with_invariant("nonneg", false)
                .entry(),
            TestModule::new("staking", &calls)
                .with_invariant("pool", true)
                .entry(),
        ],
        &PhaseOrderings::default(),
    )
    .unwrap();
    let registry = InvariantRegistry::new();
    manager.register_invariants(&registry).unwrap();

    let outcomes = registry.run_all(&ctx(1));
    let summary: Vec<_> = outcomes.iter().map(|o| (o.route(), o.broken)).collect();
    assert_eq!(
        summary,
        vec![
            ("bank/supply".to_owned(), true),
            ("bank/nonneg".to_owned(), false),
            ("staking/pool".to_owned(), true),
        ]
    );
    assert_eq!(registry.assert_all(&ctx(1)).unwrap_err().route, "bank/supply");
}

#[test]
fn duplicate_invariant_registration_is_rejected() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![
            TestModule::new("bank", &calls)
                .with_invariant("supply", false)
                .with_invariant("supply", false)
                .entry(),
        ],
        &PhaseOrderings::default(),
    )
    .unwrap();
    let err = manager
        .register_invariants(&InvariantRegistry::new())
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::DuplicateInvariant(r) if r == "bank/supply"));
}

#[test]
fn validator_updates_from_two_end_modules_are_rejected() {
    let calls = CallTracker::default();
    let manager = Manager::new(
        vec![
            TestModule::new("staking", &calls)
                .with_end_updates(vec![update("v1", 10)])
                .entry(),
            TestModule::new("poa", &calls)
                .with_end_updates(vec![update("v2", 1)])
                .entry(),
        ],
        &PhaseOrderings::uniform(&["staking", "poa"]),
    )
    .unwrap();
    run_genesis(&manager);
    manager.begin_phase(&ctx(1), &begin_req(1)).unwrap();

    let err = manager
        .end_phase(&ctx(1), &EndPhaseRequest { height: 1 })
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::PhaseExecution(PhaseExecutionError::ConflictingValidatorUpdates { ref first, ref second, .. })
            if first == "staking" && second == "poa"
    ));
}

#[test]
fn genesis_validator_updates_follow_the_same_merge_rule() {
    let calls = CallTracker::default();
    let single = Manager::new(
        vec![
            TestModule::new("auth", &calls).entry(),
            TestModule::new("staking", &calls)
                .with_genesis_updates(vec![update("v1", 10), update("v2", 3)])
                .entry(),
        ],
        &PhaseOrderings::uniform(&["auth", "staking"]),
    )
    .unwrap();
    let updates = single
        .init_genesis(&ctx(0), &JsonCodec, &GenesisState::new())
        .unwrap();
    assert_eq!(updates, vec![update("v1", 10), update("v2", 3)]);

    let double = Manager::new(
        vec![
            TestModule::new("a", &calls)
                .with_genesis_updates(vec![update("v1", 1)])
                .entry(),
            TestModule::new("b", &calls)
                .with_genesis_updates(vec![update("v2", 1)])
                .entry(),
        ],
        &PhaseOrderings::uniform(&["a", "b"]),
    )
    .unwrap();
    assert!(matches!(
        double.init_genesis(&ctx(0), &JsonCodec, &GenesisState::new()),
        Err(LifecycleError::PhaseExecution(
            PhaseExecutionError::ConflictingValidatorUpdates { .. }
        ))
    ));
}

#[test]
fn ordering_with_unknown_module_fails_fast() {
    let calls = CallTracker::default();
    let err = Manager::new(
        vec![TestModule::new("a", &calls).entry()],
        &PhaseOrderings::default().begin(&["a", "ghost"]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::UnknownModuleInOrdering { ref module, .. } if module == "ghost"
    ));
}
