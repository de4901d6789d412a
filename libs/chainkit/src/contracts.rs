//! Capability traits a module may implement.
//!
//! A module implements any subset of these. Which ones it implements is
//! recorded once, when it is built, in its [`crate::registry::ModuleEntry`];
//! the manager never probes module objects at call time.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::GenesisDecodeError;
use crate::genesis::GenesisCodec;
use crate::invariant::InvariantRegistry;
use crate::router::ModuleRouter;
use crate::types::{
    BeginPhaseRequest, EndPhaseRequest, EndPhaseResult, PhaseResult, StepCtx, ValidatorUpdate,
};

/// Failure of a genesis capability: either the payload or the module.
#[derive(Debug, thiserror::Error)]
pub enum GenesisFailure {
    #[error(transparent)]
    Decode(#[from] GenesisDecodeError),
    #[error(transparent)]
    Module(anyhow::Error),
}

/// Object-safe genesis capability, as stored in a module entry.
///
/// Most modules implement [`TypedGenesis`] and wrap it with
/// [`typed_genesis`] instead of implementing this directly.
pub trait GenesisModule: Send + Sync {
    /// Consumes this module's slice (`None` when the state has none) and
    /// returns validator updates, if this module manages the validator set.
    ///
    /// # Errors
    /// `GenesisFailure::Decode` for malformed payloads, `GenesisFailure::Module`
    /// when the module rejects decoded state.
    fn init_genesis(
        &self,
        ctx: &StepCtx,
        codec: &dyn GenesisCodec,
        slice: Option<&serde_json::Value>,
    ) -> Result<Vec<ValidatorUpdate>, GenesisFailure>;

    /// # Errors
    /// Same as `init_genesis`, without touching state.
    fn validate_genesis(
        &self,
        codec: &dyn GenesisCodec,
        slice: Option<&serde_json::Value>,
    ) -> Result<(), GenesisFailure>;

    /// The slice written by `simd init`-style tooling.
    ///
    /// # Errors
    /// If the default state cannot be serialized.
    fn default_genesis(&self) -> anyhow::Result<serde_json::Value>;

    /// Current state in genesis form.
    ///
    /// # Errors
    /// If state cannot be read or serialized.
    fn export_genesis(&self, ctx: &StepCtx) -> anyhow::Result<serde_json::Value>;
}

/// Genesis capability with a concrete payload type.
pub trait TypedGenesis: Send + Sync + 'static {
    type Genesis: Serialize + DeserializeOwned + Default;

    /// # Errors
    /// If the decoded payload violates module rules.
    fn validate(&self, _genesis: &Self::Genesis) -> anyhow::Result<()> {
        Ok(())
    }

    /// # Errors
    /// If the module cannot apply the payload to its storage.
    fn init(&self, ctx: &StepCtx, genesis: Self::Genesis) -> anyhow::Result<Vec<ValidatorUpdate>>;

    /// # Errors
    /// If state cannot be read.
    fn export(&self, ctx: &StepCtx) -> anyhow::Result<Self::Genesis>;
}

/// Wraps a [`TypedGenesis`] implementation as a [`GenesisModule`].
pub fn typed_genesis<T: TypedGenesis>(
    module: impl Into<String>,
    inner: Arc<T>,
) -> Arc<dyn GenesisModule> {
    Arc::new(TypedGenesisAdapter {
        module: module.into(),
        inner,
    })
}

struct TypedGenesisAdapter<T> {
    module: String,
    inner: Arc<T>,
}

impl<T: TypedGenesis> TypedGenesisAdapter<T> {
    fn decode(
        &self,
        codec: &dyn GenesisCodec,
        slice: Option<&serde_json::Value>,
    ) -> Result<T::Genesis, GenesisFailure> {
        let genesis = match codec.decode_slice(&self.module, slice)? {
            Some(value) => serde_json::from_value(value).map_err(|e| GenesisDecodeError {
                module: self.module.clone(),
                source: e.into(),
            })?,
            None => T::Genesis::default(),
        };
        // A payload that decodes but breaks module rules is still malformed.
        self.inner
            .validate(&genesis)
            .map_err(|source| GenesisDecodeError {
                module: self.module.clone(),
                source,
            })?;
        Ok(genesis)
    }
}

impl<T: TypedGenesis> GenesisModule for TypedGenesisAdapter<T> {
    fn init_genesis(
        &self,
        ctx: &StepCtx,
        codec: &dyn GenesisCodec,
        slice: Option<&serde_json::Value>,
    ) -> Result<Vec<ValidatorUpdate>, GenesisFailure> {
        let genesis = self.decode(codec, slice)?;
        self.inner.init(ctx, genesis).map_err(GenesisFailure::Module)
    }

    fn validate_genesis(
        &self,
        codec: &dyn GenesisCodec,
        slice: Option<&serde_json::Value>,
    ) -> Result<(), GenesisFailure> {
        self.decode(codec, slice).map(|_| ())
    }

    fn default_genesis(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(T::Genesis::default())?)
    }

    fn export_genesis(&self, ctx: &StepCtx) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::to_value(self.inner.export(ctx)?)?)
    }
}

/// Runs once per step before transactions. Writes only to own storage.
pub trait BeginPhaseModule: Send + Sync {
    /// # Errors
    /// Any error halts the step.
    fn begin_phase(&self, ctx: &StepCtx, req: &BeginPhaseRequest) -> anyhow::Result<PhaseResult>;
}

/// Runs once per step after transactions. May return validator updates.
pub trait EndPhaseModule: Send + Sync {
    /// # Errors
    /// Any error halts the step.
    fn end_phase(&self, ctx: &StepCtx, req: &EndPhaseRequest) -> anyhow::Result<EndPhaseResult>;
}

/// Publishes message and query handlers. Runs once, after every keeper
/// exists, so handlers may capture any keeper the module holds.
pub trait ServiceModule: Send + Sync {
    /// # Errors
    /// If a handler cannot be registered (e.g. duplicate route).
    fn register_services(&self, router: &mut ModuleRouter<'_>) -> anyhow::Result<()>;
}

/// Contributes consistency checks to the invariant registry.
pub trait InvariantModule: Send + Sync {
    /// # Errors
    /// If an invariant cannot be registered (e.g. duplicate route).
    fn register_invariants(&self, registry: &InvariantRegistry) -> anyhow::Result<()>;
}
