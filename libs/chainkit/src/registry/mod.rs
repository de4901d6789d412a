//! Module capability records and the registry that builds them.
//!
//! A [`ModuleFactory`] declares a module's name, dependencies and store keys,
//! and builds its keeper from a [`BuildCtx`]. The [`RegistryBuilder`] orders
//! factories by dependency, allocates stores and runs each factory once,
//! yielding a [`ModuleRegistry`] of [`ModuleEntry`] records in construction
//! order.

mod builder;

pub use builder::RegistryBuilder;

use std::fmt;
use std::sync::Arc;

use crate::context::BuildCtx;
use crate::contracts::{
    BeginPhaseModule, EndPhaseModule, GenesisModule, InvariantModule, ServiceModule, TypedGenesis,
    typed_genesis,
};
use crate::keeper_hub::KeeperHub;

/// Declares and builds one module.
pub trait ModuleFactory: Send + Sync {
    /// Unique module name; also the genesis key and route prefix.
    fn name(&self) -> &'static str;

    /// Modules whose keepers this module needs. They are built first.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    /// Store namespaces this module owns. Defaults to its own name.
    fn store_keys(&self) -> Vec<&'static str> {
        vec![self.name()]
    }

    /// Builds the module's keeper and returns its capability record.
    ///
    /// # Errors
    /// Any error aborts application construction.
    fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry>;
}

/// Capability set of one built module.
///
/// Each capability is either present (a trait object) or absent; the set is
/// fixed once the entry is built.
#[derive(Clone)]
pub struct ModuleEntry {
    pub name: String,
    pub deps: Vec<String>,
    pub genesis: Option<Arc<dyn GenesisModule>>,
    pub begin: Option<Arc<dyn BeginPhaseModule>>,
    pub end: Option<Arc<dyn EndPhaseModule>>,
    pub services: Option<Arc<dyn ServiceModule>>,
    pub invariants: Option<Arc<dyn InvariantModule>>,
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl ModuleEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
            genesis: None,
            begin: None,
            end: None,
            services: None,
            invariants: None,
        }
    }

    #[must_use]
    pub fn with_deps(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|d| (*d).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_genesis(mut self, genesis: Arc<dyn GenesisModule>) -> Self {
        self.genesis = Some(genesis);
        self
    }

    /// Shorthand for `with_genesis(typed_genesis(name, inner))`.
    #[must_use]
    pub fn with_typed_genesis<T: TypedGenesis>(self, inner: Arc<T>) -> Self {
        let genesis = typed_genesis(self.name.clone(), inner);
        self.with_genesis(genesis)
    }

    #[must_use]
    pub fn with_begin(mut self, begin: Arc<dyn BeginPhaseModule>) -> Self {
        self.begin = Some(begin);
        self
    }

    #[must_use]
    pub fn with_end(mut self, end: Arc<dyn EndPhaseModule>) -> Self {
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn with_services(mut self, services: Arc<dyn ServiceModule>) -> Self {
        self.services = Some(services);
        self
    }

    #[must_use]
    pub fn with_invariants(mut self, invariants: Arc<dyn InvariantModule>) -> Self {
        self.invariants = Some(invariants);
        self
    }

    /// Names of present capabilities, for logs and `simd check`.
    pub fn capabilities(&self) -> Vec<&'static str> {
        [
            ("genesis", self.genesis.is_some()),
            ("begin", self.begin.is_some()),
            ("end", self.end.is_some()),
            ("services", self.services.is_some()),
            ("invariants", self.invariants.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

/// Built modules in construction order, plus the keepers they published.
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
    keepers: Arc<KeeperHub>,
}

impl ModuleRegistry {
    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn keepers(&self) -> &Arc<KeeperHub> {
        &self.keepers
    }

    pub fn into_modules(self) -> Vec<ModuleEntry> {
        self.modules
    }
}
