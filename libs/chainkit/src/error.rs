//! Error taxonomy of the orchestrator.
//!
//! Every variant here is terminal for the caller: configuration and genesis
//! errors stop startup, phase errors stop forward progress of the chain.
//! Nothing in this crate retries.

use crate::types::Phase;

/// Startup-time wiring mistakes. Never recovered.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("module '{0}' registered more than once")]
    DuplicateModule(String),

    #[error("{phase} ordering references unknown module '{module}'")]
    UnknownModuleInOrdering { phase: Phase, module: String },

    #[error("{phase} ordering lists module '{module}' more than once")]
    DuplicateInOrdering { phase: Phase, module: String },

    #[error("store namespace '{0}' is already allocated")]
    DuplicateNamespace(String),

    #[error("invalid store namespace '{name}': {reason}")]
    InvalidNamespace { name: String, reason: &'static str },

    #[error("module '{module}' depends on unknown module '{dependency}'")]
    UnknownDependency { module: String, dependency: String },

    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("module '{module}' requested keeper '{keeper}' which is not provided by any of its declared dependencies")]
    UndeclaredDependency { module: String, keeper: String },

    #[error("keeper '{keeper}' provided twice (by '{first}' and '{second}')")]
    DuplicateKeeper {
        keeper: String,
        first: String,
        second: String,
    },

    #[error("service route '{0}' registered more than once")]
    DuplicateRoute(String),

    #[error("invariant '{0}' registered more than once")]
    DuplicateInvariant(String),

    #[error("genesis has already been initialized")]
    GenesisAlreadyInitialized,

    #[error("services have already been registered")]
    ServicesAlreadyRegistered,

    #[error("module '{module}' failed to register services: {source}")]
    ServiceRegistration {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module '{module}' failed to register invariants: {source}")]
    InvariantRegistration {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to construct module '{module}': {source}")]
    ModuleConstruction {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Malformed genesis payload for one module.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode genesis state of module '{module}': {source}")]
pub struct GenesisDecodeError {
    pub module: String,
    #[source]
    pub source: anyhow::Error,
}

/// A module failed while the orchestrator was driving one of its phases.
#[derive(Debug, thiserror::Error)]
pub enum PhaseExecutionError {
    #[error("module '{module}' failed in {phase}: {source}")]
    Module {
        module: String,
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    #[error("module '{second}' returned validator updates in {phase} but '{first}' already did")]
    ConflictingValidatorUpdates {
        phase: Phase,
        first: String,
        second: String,
    },
}

/// A registered invariant reported broken state.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invariant '{route}' broken: {message}")]
pub struct InvariantViolation {
    pub route: String,
    pub message: String,
}

/// Everything the manager's entry points can return.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    GenesisDecode(#[from] GenesisDecodeError),

    #[error(transparent)]
    PhaseExecution(#[from] PhaseExecutionError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("{phase} called out of sequence: {detail}")]
    OutOfSequence { phase: Phase, detail: String },

    #[error("state machine halted after a previous failure; refusing {0}")]
    Halted(Phase),
}

impl LifecycleError {
    /// True for errors that must stop the process rather than just the call.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::OutOfSequence { .. })
    }
}
