use std::sync::Arc;

use anyhow::Context;
use auth::{AuthModule, FEE_COLLECTOR, Permission};
use bank::BankModule;
use chainkit::router::RouterError;
use chainkit::{
    BeginPhaseRequest, BeginPhaseResponse, EndPhaseRequest, EndPhaseResponse, GenesisState,
    InvariantRegistry, JsonCodec, LifecycleError, Manager, MemKvStore, PhaseOrderings,
    RegistryBuilder, ServiceRouter, StepCtx, StoreAllocator, ValidatorUpdate,
};
use chainkit_bootstrap::{AppConfig, AppConfigProvider};
use chrono::{DateTime, TimeDelta, Utc};
use consensus::ConsensusModule;
use crisis::CrisisModule;
use staking::{BONDED_POOL, NOT_BONDED_POOL, StakingModule};

use crate::genesis::GenesisDoc;

/// Built-in phase orders; `orderings` in the config replaces any of them.
#[must_use]
pub fn default_orderings() -> PhaseOrderings {
    PhaseOrderings::default()
        .genesis(&["consensus", "auth", "bank", "staking", "crisis"])
        .begin(&["consensus", "staking", "auth", "bank", "crisis"])
        .end(&["consensus", "crisis", "staking", "auth", "bank"])
}

fn module_factories(invariants: &Arc<InvariantRegistry>) -> RegistryBuilder {
    let accounts = AuthModule::new()
        .with_module_account(FEE_COLLECTOR, &[])
        .with_module_account(BONDED_POOL, &[Permission::Burner, Permission::Staking])
        .with_module_account(NOT_BONDED_POOL, &[Permission::Burner, Permission::Staking]);

    RegistryBuilder::new()
        .with(Arc::new(ConsensusModule))
        .with(Arc::new(accounts))
        .with(Arc::new(BankModule))
        .with(Arc::new(StakingModule))
        .with(Arc::new(CrisisModule::new(Arc::clone(invariants))))
}

/// Result of one begin/end step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub height: u64,
    pub begin: BeginPhaseResponse,
    pub end: EndPhaseResponse,
    pub app_hash: String,
}

/// The assembled application: modules, their shared store, message router
/// and invariant registry.
pub struct SimApp {
    chain_id: String,
    block_interval_ms: u64,
    backing: Arc<MemKvStore>,
    manager: Manager,
    router: ServiceRouter,
    invariants: Arc<InvariantRegistry>,
    genesis_time: parking_lot::Mutex<Option<DateTime<Utc>>>,
}

impl SimApp {
    /// Builds every module, validates the phase orders and registers
    /// services and invariants.
    ///
    /// # Errors
    /// Any configuration error from construction.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let backing = Arc::new(MemKvStore::new());
        let allocator = StoreAllocator::new(backing.clone());
        let invariants = Arc::new(InvariantRegistry::new());

        let registry = module_factories(&invariants)
            .build_topo_sorted(&allocator, Arc::new(AppConfigProvider::new(config)))
            .context("failed to build modules")?;
        tracing::info!(
            modules = ?registry.names(),
            stores = ?allocator.namespaces(),
            "Modules built"
        );

        let orderings = default_orderings().overridden_by(&config.orderings);
        let manager = Manager::new(registry.into_modules(), &orderings)
            .context("invalid phase orderings")?;

        let mut router = ServiceRouter::new();
        manager.register_services(&mut router)?;
        manager.register_invariants(&invariants)?;

        Ok(Self {
            chain_id: config.node.chain_id.clone(),
            block_interval_ms: config.node.block_interval_ms,
            backing,
            manager,
            router,
            invariants,
            genesis_time: parking_lot::Mutex::new(None),
        })
    }

    #[must_use]
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    #[must_use]
    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    #[must_use]
    pub fn router(&self) -> &ServiceRouter {
        &self.router
    }

    #[must_use]
    pub fn invariants(&self) -> &InvariantRegistry {
        &self.invariants
    }

    /// Hex digest of the whole store.
    #[must_use]
    pub fn app_hash(&self) -> String {
        self.backing.root_hash_hex()
    }

    /// Genesis file with every module's default state.
    ///
    /// # Errors
    /// If a default state cannot be serialized.
    pub fn default_genesis_doc(&self, genesis_time: DateTime<Utc>) -> anyhow::Result<GenesisDoc> {
        Ok(GenesisDoc {
            chain_id: self.chain_id.clone(),
            genesis_time,
            app_state: self.manager.default_genesis()?,
        })
    }

    fn check_chain_id(&self, doc: &GenesisDoc) -> anyhow::Result<()> {
        if doc.chain_id != self.chain_id {
            anyhow::bail!(
                "genesis chain_id '{}' does not match configured '{}'",
                doc.chain_id,
                self.chain_id
            );
        }
        Ok(())
    }

    /// Checks a genesis file without applying it.
    ///
    /// # Errors
    /// Chain id mismatch or an invalid module slice.
    pub fn validate_genesis(&self, doc: &GenesisDoc) -> anyhow::Result<()> {
        self.check_chain_id(doc)?;
        self.manager.validate_genesis(&JsonCodec, &doc.app_state)?;
        Ok(())
    }

    /// Applies genesis; the first block is height 1.
    ///
    /// # Errors
    /// Chain id mismatch or any lifecycle error.
    pub fn init_chain(&self, doc: &GenesisDoc) -> anyhow::Result<Vec<ValidatorUpdate>> {
        self.check_chain_id(doc)?;
        let ctx = StepCtx::genesis(&self.chain_id, doc.genesis_time);
        let updates = self
            .manager
            .init_genesis(&ctx, &JsonCodec, &doc.app_state)?;
        *self.genesis_time.lock() = Some(doc.genesis_time);
        tracing::info!(
            validators = updates.len(),
            app_hash = %self.app_hash(),
            "Chain initialized"
        );
        Ok(updates)
    }

    /// Block time: genesis time plus one interval per height.
    fn block_time(&self, height: u64) -> DateTime<Utc> {
        let genesis = self.genesis_time.lock().unwrap_or_else(Utc::now);
        i64::try_from(self.block_interval_ms.saturating_mul(height))
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|d| genesis.checked_add_signed(d))
            .unwrap_or(genesis)
    }

    fn ctx(&self, height: u64) -> StepCtx {
        StepCtx::new(&self.chain_id, height, self.block_time(height))
    }

    /// Runs the begin phase of `height`, then its end phase.
    ///
    /// # Errors
    /// Any lifecycle error; module failures leave the app halted.
    pub fn step(&self, height: u64) -> Result<StepOutcome, LifecycleError> {
        self.step_with_msgs(height, &[]).map(|(outcome, _)| outcome)
    }

    /// Runs the begin phase of `height`, then `msgs`, then its end phase.
    /// A failing message is logged and skipped.
    ///
    /// # Errors
    /// Any lifecycle error.
    pub fn step_with_msgs(
        &self,
        height: u64,
        msgs: &[(&str, serde_json::Value)],
    ) -> Result<(StepOutcome, Vec<Result<serde_json::Value, RouterError>>), LifecycleError> {
        let ctx = self.ctx(height);
        let begin = self.manager.begin_phase(
            &ctx,
            &BeginPhaseRequest {
                height,
                time: ctx.time,
                proposer: None,
            },
        )?;
        let results = msgs
            .iter()
            .map(|(route, payload)| {
                let result = self.router.dispatch_msg(&ctx, route, payload.clone());
                if let Err(e) = &result {
                    tracing::warn!(route, height, error = %e, "Message failed");
                }
                result
            })
            .collect();
        let end = self.manager.end_phase(&ctx, &EndPhaseRequest { height })?;
        Ok((
            StepOutcome {
                height,
                begin,
                end,
                app_hash: self.app_hash(),
            },
            results,
        ))
    }

    /// # Errors
    /// Unknown route, bad request or handler failure.
    pub fn query(&self, route: &str, payload: serde_json::Value) -> Result<serde_json::Value, RouterError> {
        self.router.query(route, payload)
    }

    /// Current state as a genesis file.
    ///
    /// # Errors
    /// If any module fails to export.
    pub fn export(&self) -> anyhow::Result<GenesisDoc> {
        let height = self.manager.last_height().unwrap_or(0);
        let app_state: GenesisState = self.manager.export_genesis(&self.ctx(height))?;
        Ok(GenesisDoc {
            chain_id: self.chain_id.clone(),
            genesis_time: self.block_time(height),
            app_state,
        })
    }
}
