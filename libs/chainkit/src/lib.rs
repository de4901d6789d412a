#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Chainkit: module lifecycle orchestration for a deterministic state machine.
//!
//! Applications declare module factories, build them into a
//! [`registry::ModuleRegistry`] (dependency-ordered, each with isolated
//! storage), then hand the resulting entries to a [`Manager`] that drives
//! genesis and per-step begin/end phases in configured orders.
//!
//! ```ignore
//! let backing = Arc::new(MemKvStore::new());
//! let registry = RegistryBuilder::new()
//!     .with(Arc::new(AuthFactory))
//!     .with(Arc::new(BankFactory))
//!     .build_topo_sorted(&StoreAllocator::new(backing), config)?;
//! let manager = Manager::new(registry.into_modules(), &orderings)?;
//! manager.init_genesis(&StepCtx::genesis("chain", now), &JsonCodec, &genesis)?;
//! ```

pub mod config;
pub mod context;
pub mod contracts;
pub mod error;
pub mod genesis;
pub mod invariant;
pub mod keeper_hub;
pub mod manager;
pub mod registry;
pub mod router;
pub mod store;
pub mod types;

pub use context::BuildCtx;
pub use contracts::{
    BeginPhaseModule, EndPhaseModule, GenesisModule, InvariantModule, ServiceModule, TypedGenesis,
};
pub use error::{
    ConfigurationError, GenesisDecodeError, InvariantViolation, LifecycleError,
    PhaseExecutionError,
};
pub use genesis::{GenesisCodec, GenesisState, JsonCodec};
pub use invariant::{InvariantCheck, InvariantRegistry};
pub use keeper_hub::KeeperHub;
pub use manager::{Manager, PhaseOrderings};
pub use registry::{ModuleEntry, ModuleFactory, ModuleRegistry, RegistryBuilder};
pub use router::{ModuleRouter, ServiceRouter};
pub use store::{KvStore, MemKvStore, StoreAllocator, StoreHandle};
pub use types::{
    BeginPhaseRequest, BeginPhaseResponse, EndPhaseRequest, EndPhaseResponse, EndPhaseResult,
    Event, ModuleEvent, Phase, PhaseResult, StepCtx, ValidatorUpdate,
};
