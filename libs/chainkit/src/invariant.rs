//! Registry of named consistency checks.
//!
//! Modules register invariants while the application is being wired; the
//! registry keeps them for the application's lifetime. Running them is
//! on-demand: the registry reports, the caller decides whether a broken
//! invariant halts the chain.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigurationError, InvariantViolation};
use crate::types::StepCtx;

/// What a single check reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantCheck {
    pub message: String,
    pub broken: bool,
}

impl InvariantCheck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            broken: false,
        }
    }

    pub fn broken(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            broken: true,
        }
    }
}

pub type InvariantFn = Arc<dyn Fn(&StepCtx) -> InvariantCheck + Send + Sync>;

/// Outcome of one invariant in a `run_all` sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantOutcome {
    pub module: String,
    pub name: String,
    pub broken: bool,
    pub message: String,
}

impl InvariantOutcome {
    pub fn route(&self) -> String {
        format_route(&self.module, &self.name)
    }
}

struct Entry {
    module: String,
    name: String,
    check: InvariantFn,
}

#[derive(Default)]
pub struct InvariantRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvariantRegistry")
            .field("routes", &self.routes())
            .finish()
    }
}

/// `"<module>/<name>"`.
pub fn format_route(module: &str, name: &str) -> String {
    format!("{module}/{name}")
}

impl InvariantRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an invariant. Order of registration is the order of execution.
    ///
    /// # Errors
    /// `ConfigurationError::DuplicateInvariant` if `module/name` is taken.
    pub fn register<F>(&self, module: &str, name: &str, check: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&StepCtx) -> InvariantCheck + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.module == module && e.name == name) {
            return Err(ConfigurationError::DuplicateInvariant(format_route(
                module, name,
            )));
        }
        tracing::debug!(module, invariant = name, "Registered invariant");
        entries.push(Entry {
            module: module.to_owned(),
            name: name.to_owned(),
            check: Arc::new(check),
        });
        Ok(())
    }

    /// Runs every invariant in registration order. Never short-circuits.
    pub fn run_all(&self, ctx: &StepCtx) -> Vec<InvariantOutcome> {
        // Snapshot so checks may read the registry without deadlocking.
        let checks: Vec<(String, String, InvariantFn)> = self
            .entries
            .read()
            .iter()
            .map(|e| (e.module.clone(), e.name.clone(), Arc::clone(&e.check)))
            .collect();

        checks
            .into_iter()
            .map(|(module, name, check)| {
                let result = check(ctx);
                if result.broken {
                    tracing::error!(
                        module = %module,
                        invariant = %name,
                        height = ctx.height,
                        message = %result.message,
                        "Invariant broken"
                    );
                }
                InvariantOutcome {
                    module,
                    name,
                    broken: result.broken,
                    message: result.message,
                }
            })
            .collect()
    }

    /// Runs a single invariant by route; `None` if no such route.
    pub fn run_one(&self, ctx: &StepCtx, route: &str) -> Option<InvariantOutcome> {
        let (module, name, check) = self
            .entries
            .read()
            .iter()
            .find(|e| format_route(&e.module, &e.name) == route)
            .map(|e| (e.module.clone(), e.name.clone(), Arc::clone(&e.check)))?;
        let result = check(ctx);
        Some(InvariantOutcome {
            module,
            name,
            broken: result.broken,
            message: result.message,
        })
    }

    /// Runs everything and fails on the first broken result, for callers
    /// whose policy is to halt.
    ///
    /// # Errors
    /// `InvariantViolation` for the first broken invariant in registration order.
    pub fn assert_all(&self, ctx: &StepCtx) -> Result<(), InvariantViolation> {
        match self.run_all(ctx).into_iter().find(|o| o.broken) {
            Some(outcome) => Err(InvariantViolation {
                route: outcome.route(),
                message: outcome.message,
            }),
            None => Ok(()),
        }
    }

    pub fn routes(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|e| format_route(&e.module, &e.name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Module names with at least one invariant, first-registration order.
    pub fn modules(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .read()
            .iter()
            .filter(|e| seen.insert(e.module.clone()))
            .map(|e| e.module.clone())
            .collect()
    }
}
