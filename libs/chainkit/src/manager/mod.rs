//! Lifecycle orchestrator.
//!
//! Drives every module through `InitGenesis`, then alternating `BeginPhase`
//! / `EndPhase` steps, in three independently configured orders:
//!
//! ```text
//! Constructed --init_genesis--> Ready(h0)
//! Ready(h)    --begin_phase(h+1)--> InStep(h+1)
//! InStep(h)   --end_phase(h)--> Ready(h)
//! any failure of a module or payload --> Halted
//! ```
//!
//! The state is set to `Halted` while modules run and restored only when
//! the whole phase succeeds, so a panicking module also halts the manager.
//!
//! Phase calls are serialized; module calls within a phase run one at a time
//! in the configured order. The first module failure ends the call and halts
//! the manager, so no later module observes a partially applied phase.

mod ordering;

pub use ordering::PhaseOrderings;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::contracts::GenesisFailure;
use crate::error::{ConfigurationError, LifecycleError, PhaseExecutionError};
use crate::genesis::{GenesisCodec, GenesisState};
use crate::invariant::InvariantRegistry;
use crate::registry::ModuleEntry;
use crate::router::ServiceRouter;
use crate::types::{
    BeginPhaseRequest, BeginPhaseResponse, EndPhaseRequest, EndPhaseResponse, ModuleEvent, Phase,
    StepCtx, ValidatorUpdate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Constructed,
    Ready { last_height: u64 },
    InStep { height: u64 },
    Halted,
}

/// Owns the module set and the three phase orderings.
pub struct Manager {
    modules: Vec<ModuleEntry>,
    genesis_order: Vec<usize>,
    begin_order: Vec<usize>,
    end_order: Vec<usize>,
    state: Mutex<LifecycleState>,
    services_registered: AtomicBool,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("modules", &self.module_names())
            .field("genesis_order", &self.names_of(&self.genesis_order))
            .field("begin_order", &self.names_of(&self.begin_order))
            .field("end_order", &self.names_of(&self.end_order))
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Records which module returned validator updates, rejecting a second one.
struct UpdateMerge {
    phase: Phase,
    contributor: Option<String>,
    updates: Vec<ValidatorUpdate>,
}

impl UpdateMerge {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            contributor: None,
            updates: Vec::new(),
        }
    }

    fn add(
        &mut self,
        module: &str,
        updates: Vec<ValidatorUpdate>,
    ) -> Result<(), PhaseExecutionError> {
        if updates.is_empty() {
            return Ok(());
        }
        if let Some(first) = &self.contributor {
            return Err(PhaseExecutionError::ConflictingValidatorUpdates {
                phase: self.phase,
                first: first.clone(),
                second: module.to_owned(),
            });
        }
        self.contributor = Some(module.to_owned());
        self.updates = updates;
        Ok(())
    }
}

impl Manager {
    /// `modules` must be in construction order (as produced by the registry).
    ///
    /// # Errors
    /// Duplicate module names; unknown or repeated names in an ordering.
    pub fn new(
        modules: Vec<ModuleEntry>,
        orderings: &PhaseOrderings,
    ) -> Result<Self, ConfigurationError> {
        for (i, m) in modules.iter().enumerate() {
            if modules[..i].iter().any(|prev| prev.name == m.name) {
                return Err(ConfigurationError::DuplicateModule(m.name.clone()));
            }
        }

        let genesis_order = resolve(&modules, Phase::InitGenesis, &orderings.genesis)?;
        let begin_order = resolve(&modules, Phase::BeginPhase, &orderings.begin)?;
        let end_order = resolve(&modules, Phase::EndPhase, &orderings.end)?;

        let manager = Self {
            modules,
            genesis_order,
            begin_order,
            end_order,
            state: Mutex::new(LifecycleState::Constructed),
            services_registered: AtomicBool::new(false),
        };
        manager.log_unordered_capabilities();
        Ok(manager)
    }

    fn log_unordered_capabilities(&self) {
        for (i, m) in self.modules.iter().enumerate() {
            let checks = [
                (Phase::InitGenesis, m.genesis.is_some(), &self.genesis_order),
                (Phase::BeginPhase, m.begin.is_some(), &self.begin_order),
                (Phase::EndPhase, m.end.is_some(), &self.end_order),
            ];
            for (phase, capable, order) in checks {
                if capable && !order.contains(&i) {
                    tracing::debug!(
                        module = %m.name,
                        %phase,
                        "Module implements phase but is not in its ordering; it will be skipped"
                    );
                }
            }
        }
    }

    fn names_of(&self, order: &[usize]) -> Vec<&str> {
        order.iter().map(|&i| self.modules[i].name.as_str()).collect()
    }

    /// Module names in construction order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    /// The resolved orderings, as names.
    pub fn orderings(&self) -> PhaseOrderings {
        let owned = |order: &[usize]| {
            self.names_of(order)
                .into_iter()
                .map(str::to_owned)
                .collect()
        };
        PhaseOrderings {
            genesis: owned(&self.genesis_order),
            begin: owned(&self.begin_order),
            end: owned(&self.end_order),
        }
    }

    pub fn is_halted(&self) -> bool {
        *self.state.lock() == LifecycleState::Halted
    }

    /// Height of the last completed step (or genesis), if any.
    pub fn last_height(&self) -> Option<u64> {
        match *self.state.lock() {
            LifecycleState::Ready { last_height } => Some(last_height),
            _ => None,
        }
    }

    /// Runs genesis for every module in genesis order and returns the
    /// initial validator set. A module without a slice in `genesis` gets its
    /// default state; slices for modules outside the ordering are ignored.
    ///
    /// # Errors
    /// `GenesisAlreadyInitialized` on a second call, `GenesisDecode` for a
    /// malformed slice, `PhaseExecution` for a module failure or conflicting
    /// validator updates. Every error except `GenesisAlreadyInitialized`
    /// halts the manager.
    pub fn init_genesis(
        &self,
        ctx: &StepCtx,
        codec: &dyn GenesisCodec,
        genesis: &GenesisState,
    ) -> Result<Vec<ValidatorUpdate>, LifecycleError> {
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Constructed => {}
            LifecycleState::Halted => return Err(LifecycleError::Halted(Phase::InitGenesis)),
            LifecycleState::Ready { .. } | LifecycleState::InStep { .. } => {
                return Err(ConfigurationError::GenesisAlreadyInitialized.into());
            }
        }

        // Stays halted if a module panics mid-genesis.
        *state = LifecycleState::Halted;

        let _span = tracing::info_span!("init_genesis", chain_id = %ctx.chain_id).entered();
        for name in genesis.modules() {
            if !self.genesis_order.iter().any(|&i| self.modules[i].name == name) {
                tracing::debug!(module = name, "Genesis slice ignored: module not in genesis order");
            }
        }

        match self.run_genesis(ctx, codec, genesis) {
            Ok(updates) => {
                *state = LifecycleState::Ready {
                    last_height: ctx.height,
                };
                tracing::info!(validator_updates = updates.len(), "Genesis initialized");
                Ok(updates)
            }
            Err(err) => {
                *state = LifecycleState::Halted;
                tracing::error!(error = %err, "Genesis failed; halting");
                Err(err)
            }
        }
    }

    fn run_genesis(
        &self,
        ctx: &StepCtx,
        codec: &dyn GenesisCodec,
        genesis: &GenesisState,
    ) -> Result<Vec<ValidatorUpdate>, LifecycleError> {
        let mut merge = UpdateMerge::new(Phase::InitGenesis);
        for &i in &self.genesis_order {
            let entry = &self.modules[i];
            let Some(module) = &entry.genesis else {
                continue;
            };
            tracing::debug!(module = %entry.name, "init_genesis");
            let updates = module
                .init_genesis(ctx, codec, genesis.get(&entry.name))
                .map_err(|failure| match failure {
                    GenesisFailure::Decode(err) => LifecycleError::GenesisDecode(err),
                    GenesisFailure::Module(source) => PhaseExecutionError::Module {
                        module: entry.name.clone(),
                        phase: Phase::InitGenesis,
                        source,
                    }
                    .into(),
                })?;
            merge.add(&entry.name, updates)?;
        }
        Ok(merge.updates)
    }

    /// Opens step `req.height` and runs every module in begin order.
    ///
    /// # Errors
    /// `OutOfSequence` if genesis has not run, a step is already open, or the
    /// height is not the next one; `PhaseExecution` (halting) for a module
    /// failure; `Halted` after any earlier failure.
    pub fn begin_phase(
        &self,
        ctx: &StepCtx,
        req: &BeginPhaseRequest,
    ) -> Result<BeginPhaseResponse, LifecycleError> {
        let phase = Phase::BeginPhase;
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Ready { last_height } => match last_height.checked_add(1) {
                Some(next) if next == req.height => {}
                Some(next) => {
                    return Err(out_of_sequence(
                        phase,
                        format!("expected height {next}, got {}", req.height),
                    ));
                }
                None => {
                    return Err(out_of_sequence(
                        phase,
                        format!("no height follows {last_height}"),
                    ));
                }
            },
            LifecycleState::Constructed => {
                return Err(out_of_sequence(phase, "genesis has not been initialized"));
            }
            LifecycleState::InStep { height } => {
                return Err(out_of_sequence(
                    phase,
                    format!("step {height} has not been ended"),
                ));
            }
            LifecycleState::Halted => return Err(LifecycleError::Halted(phase)),
        }
        if ctx.height != req.height {
            return Err(out_of_sequence(
                phase,
                format!("context height {} != request height {}", ctx.height, req.height),
            ));
        }

        // Stays halted if a module panics mid-phase.
        *state = LifecycleState::Halted;

        let _span = tracing::info_span!("begin_phase", height = req.height).entered();
        let mut events = Vec::new();
        for &i in &self.begin_order {
            let entry = &self.modules[i];
            let Some(module) = &entry.begin else {
                continue;
            };
            tracing::trace!(module = %entry.name, "begin_phase");
            match module.begin_phase(ctx, req) {
                Ok(result) => events.extend(tag(&entry.name, result.events)),
                Err(source) => {
                    *state = LifecycleState::Halted;
                    tracing::error!(module = %entry.name, error = %source, "Begin phase failed; halting");
                    return Err(PhaseExecutionError::Module {
                        module: entry.name.clone(),
                        phase,
                        source,
                    }
                    .into());
                }
            }
        }

        *state = LifecycleState::InStep { height: req.height };
        Ok(BeginPhaseResponse { events })
    }

    /// Closes the open step and runs every module in end order.
    ///
    /// # Errors
    /// `OutOfSequence` if no step is open or heights differ; `PhaseExecution`
    /// (halting) for a module failure or conflicting validator updates;
    /// `Halted` after any earlier failure.
    pub fn end_phase(
        &self,
        ctx: &StepCtx,
        req: &EndPhaseRequest,
    ) -> Result<EndPhaseResponse, LifecycleError> {
        let phase = Phase::EndPhase;
        let mut state = self.state.lock();
        match *state {
            LifecycleState::InStep { height } if height == req.height => {}
            LifecycleState::InStep { height } => {
                return Err(out_of_sequence(
                    phase,
                    format!("open step is {height}, got {}", req.height),
                ));
            }
            LifecycleState::Constructed | LifecycleState::Ready { .. } => {
                return Err(out_of_sequence(phase, "no step is open"));
            }
            LifecycleState::Halted => return Err(LifecycleError::Halted(phase)),
        }
        if ctx.height != req.height {
            return Err(out_of_sequence(
                phase,
                format!("context height {} != request height {}", ctx.height, req.height),
            ));
        }
        // Stays halted if a module panics mid-phase.
        *state = LifecycleState::Halted;

        let _span = tracing::info_span!("end_phase", height = req.height).entered();
        match self.run_end(ctx, req) {
            Ok(response) => {
                *state = LifecycleState::Ready {
                    last_height: req.height,
                };
                Ok(response)
            }
            Err(err) => {
                *state = LifecycleState::Halted;
                tracing::error!(error = %err, "End phase failed; halting");
                Err(err.into())
            }
        }
    }

    fn run_end(
        &self,
        ctx: &StepCtx,
        req: &EndPhaseRequest,
    ) -> Result<EndPhaseResponse, PhaseExecutionError> {
        let mut events = Vec::new();
        let mut merge = UpdateMerge::new(Phase::EndPhase);
        for &i in &self.end_order {
            let entry = &self.modules[i];
            let Some(module) = &entry.end else {
                continue;
            };
            tracing::trace!(module = %entry.name, "end_phase");
            let result = module
                .end_phase(ctx, req)
                .map_err(|source| PhaseExecutionError::Module {
                    module: entry.name.clone(),
                    phase: Phase::EndPhase,
                    source,
                })?;
            events.extend(tag(&entry.name, result.events));
            merge.add(&entry.name, result.validator_updates)?;
        }
        Ok(EndPhaseResponse {
            events,
            validator_updates: merge.updates,
        })
    }

    /// Lets every module with handlers publish them, in construction order.
    ///
    /// # Errors
    /// `ServicesAlreadyRegistered` on a second call; `DuplicateRoute` or
    /// `ServiceRegistration` when a module fails.
    pub fn register_services(&self, router: &mut ServiceRouter) -> Result<(), ConfigurationError> {
        if self.services_registered.swap(true, Ordering::SeqCst) {
            return Err(ConfigurationError::ServicesAlreadyRegistered);
        }
        for entry in &self.modules {
            let Some(services) = &entry.services else {
                continue;
            };
            tracing::debug!(module = %entry.name, "Registering services");
            services
                .register_services(&mut router.for_module(&entry.name))
                .map_err(|source| match source.downcast::<ConfigurationError>() {
                    Ok(err) => err,
                    Err(source) => ConfigurationError::ServiceRegistration {
                        module: entry.name.clone(),
                        source,
                    },
                })?;
        }
        Ok(())
    }

    /// Collects invariants from every contributing module, in construction
    /// order.
    ///
    /// # Errors
    /// `DuplicateInvariant` or `InvariantRegistration` when a module fails.
    pub fn register_invariants(
        &self,
        registry: &InvariantRegistry,
    ) -> Result<(), ConfigurationError> {
        for entry in &self.modules {
            let Some(invariants) = &entry.invariants else {
                continue;
            };
            invariants
                .register_invariants(registry)
                .map_err(|source| match source.downcast::<ConfigurationError>() {
                    Ok(err) => err,
                    Err(source) => ConfigurationError::InvariantRegistration {
                        module: entry.name.clone(),
                        source,
                    },
                })?;
        }
        tracing::debug!(count = registry.len(), "Invariants registered");
        Ok(())
    }

    /// Current state of every module in genesis order, in genesis form.
    ///
    /// # Errors
    /// `PhaseExecutionError::Module` with phase `export_genesis`.
    pub fn export_genesis(&self, ctx: &StepCtx) -> Result<GenesisState, PhaseExecutionError> {
        let mut out = GenesisState::new();
        for &i in &self.genesis_order {
            let entry = &self.modules[i];
            if let Some(module) = &entry.genesis {
                let slice = module.export_genesis(ctx).map_err(|source| {
                    PhaseExecutionError::Module {
                        module: entry.name.clone(),
                        phase: Phase::ExportGenesis,
                        source,
                    }
                })?;
                out.insert(entry.name.clone(), slice);
            }
        }
        Ok(out)
    }

    /// Checks every slice the genesis order would consume, without touching
    /// state.
    ///
    /// # Errors
    /// `GenesisDecodeError` for the first malformed slice.
    pub fn validate_genesis(
        &self,
        codec: &dyn GenesisCodec,
        genesis: &GenesisState,
    ) -> Result<(), LifecycleError> {
        for &i in &self.genesis_order {
            let entry = &self.modules[i];
            if let Some(module) = &entry.genesis {
                module
                    .validate_genesis(codec, genesis.get(&entry.name))
                    .map_err(|failure| match failure {
                        GenesisFailure::Decode(err) => LifecycleError::GenesisDecode(err),
                        GenesisFailure::Module(source) => PhaseExecutionError::Module {
                            module: entry.name.clone(),
                            phase: Phase::InitGenesis,
                            source,
                        }
                        .into(),
                    })?;
            }
        }
        Ok(())
    }

    /// Default slice of every genesis-capable module in genesis order.
    ///
    /// # Errors
    /// If a module's default state cannot be serialized.
    pub fn default_genesis(&self) -> anyhow::Result<GenesisState> {
        let mut out = GenesisState::new();
        for &i in &self.genesis_order {
            let entry = &self.modules[i];
            if let Some(module) = &entry.genesis {
                let slice = module.default_genesis().map_err(|e| {
                    e.context(format!("default genesis of module '{}'", entry.name))
                })?;
                out.insert(entry.name.clone(), slice);
            }
        }
        Ok(out)
    }
}

fn resolve(
    modules: &[ModuleEntry],
    phase: Phase,
    names: &[String],
) -> Result<Vec<usize>, ConfigurationError> {
    let mut order = Vec::with_capacity(names.len());
    for name in names {
        let idx = modules
            .iter()
            .position(|m| &m.name == name)
            .ok_or_else(|| ConfigurationError::UnknownModuleInOrdering {
                phase,
                module: name.clone(),
            })?;
        if order.contains(&idx) {
            return Err(ConfigurationError::DuplicateInOrdering {
                phase,
                module: name.clone(),
            });
        }
        order.push(idx);
    }
    Ok(order)
}

fn tag(module: &str, events: Vec<crate::types::Event>) -> impl Iterator<Item = ModuleEvent> + '_ {
    events.into_iter().map(move |event| ModuleEvent {
        module: module.to_owned(),
        event,
    })
}

fn out_of_sequence(phase: Phase, detail: impl Into<String>) -> LifecycleError {
    LifecycleError::OutOfSequence {
        phase,
        detail: detail.into(),
    }
}
