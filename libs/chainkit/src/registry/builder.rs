use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::{ModuleEntry, ModuleFactory, ModuleRegistry};
use crate::config::ConfigProvider;
use crate::context::BuildCtx;
use crate::error::ConfigurationError;
use crate::keeper_hub::KeeperHub;
use crate::store::StoreAllocator;

/// Collects module factories in declaration order and builds them in
/// dependency order.
#[derive(Default)]
pub struct RegistryBuilder {
    factories: Vec<Arc<dyn ModuleFactory>>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn ModuleFactory>) -> &mut Self {
        self.factories.push(factory);
        self
    }

    #[must_use]
    pub fn with(mut self, factory: Arc<dyn ModuleFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Module names in the order they will be built.
    ///
    /// # Errors
    /// Duplicate names, unknown dependencies, or a dependency cycle.
    pub fn construction_order(&self) -> Result<Vec<&'static str>, ConfigurationError> {
        let order = self.topo_sort()?;
        Ok(order.into_iter().map(|i| self.factories[i].name()).collect())
    }

    /// Validates the dependency graph, then allocates stores for and builds
    /// every module in topological order.
    ///
    /// # Errors
    /// Any `ConfigurationError`; a factory's own error is wrapped as
    /// `ModuleConstruction` unless it already is a `ConfigurationError`.
    pub fn build_topo_sorted(
        self,
        allocator: &StoreAllocator,
        config: Arc<dyn ConfigProvider>,
    ) -> Result<ModuleRegistry, ConfigurationError> {
        let order = self.topo_sort()?;
        let keepers = Arc::new(KeeperHub::new());
        let mut modules = Vec::with_capacity(order.len());

        for idx in order {
            let factory = &self.factories[idx];
            let name = factory.name();
            let deps = factory.dependencies();

            let stores = allocator.allocate(&factory.store_keys())?;
            let ctx = BuildCtx::new(
                name,
                deps.iter().map(|d| (*d).to_owned()).collect(),
                stores,
                Arc::clone(&keepers),
                Arc::clone(&config),
            );

            let entry = factory.build(&ctx).map_err(|source| {
                match source.downcast::<ConfigurationError>() {
                    Ok(err) => err,
                    Err(source) => ConfigurationError::ModuleConstruction {
                        module: name.to_owned(),
                        source,
                    },
                }
            })?;
            if entry.name != name {
                return Err(ConfigurationError::ModuleConstruction {
                    module: name.to_owned(),
                    source: anyhow::anyhow!("factory returned an entry named '{}'", entry.name),
                });
            }

            let entry = entry.with_deps(deps);
            tracing::info!(
                module = name,
                deps = ?entry.deps,
                capabilities = ?entry.capabilities(),
                "Module built"
            );
            modules.push(entry);
        }

        Ok(ModuleRegistry { modules, keepers })
    }

    /// Kahn's algorithm, always taking the ready module declared first, so a
    /// declaration order that already satisfies every dependency is kept.
    fn topo_sort(&self) -> Result<Vec<usize>, ConfigurationError> {
        let mut index: HashMap<&'static str, usize> = HashMap::new();
        for (i, f) in self.factories.iter().enumerate() {
            if index.insert(f.name(), i).is_some() {
                return Err(ConfigurationError::DuplicateModule(f.name().to_owned()));
            }
        }

        let n = self.factories.len();
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(n);
        for f in &self.factories {
            let mut seen = HashSet::new();
            let mut resolved = Vec::new();
            for dep in f.dependencies() {
                let &d = index
                    .get(dep)
                    .ok_or_else(|| ConfigurationError::UnknownDependency {
                        module: f.name().to_owned(),
                        dependency: (*dep).to_owned(),
                    })?;
                if seen.insert(d) {
                    resolved.push(d);
                }
            }
            deps.push(resolved);
        }

        let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, ds) in deps.iter().enumerate() {
            for &d in ds {
                dependents[d].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &j in &dependents[i] {
                pending[j] -= 1;
                if pending[j] == 0 {
                    ready.insert(j);
                }
            }
        }

        if order.len() < n {
            return Err(ConfigurationError::DependencyCycle(
                self.find_cycle(&deps, &pending),
            ));
        }
        Ok(order)
    }

    /// Every module left unsorted still has an unsorted dependency, so
    /// following those edges from any of them must revisit a module.
    fn find_cycle(&self, deps: &[Vec<usize>], pending: &[usize]) -> Vec<String> {
        let Some(start) = (0..pending.len()).find(|&i| pending[i] > 0) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = deps[current].iter().find(|&&d| pending[d] > 0) else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.factories[i].name().to_owned())
                    .collect();
                cycle.push(self.factories[next].name().to_owned());
                return cycle;
            }
            path.push(next);
            current = next;
        }
        path.iter()
            .map(|&i| self.factories[i].name().to_owned())
            .collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::MapConfigProvider;
    use crate::store::MemKvStore;

    struct Factory {
        name: &'static str,
        deps: &'static [&'static str],
    }

    impl ModuleFactory for Factory {
        fn name(&self) -> &'static str {
            self.name
        }

        fn dependencies(&self) -> &'static [&'static str] {
            self.deps
        }

        fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
            Ok(ModuleEntry::new(ctx.module_name()))
        }
    }

    fn f(name: &'static str, deps: &'static [&'static str]) -> Arc<dyn ModuleFactory> {
        Arc::new(Factory { name, deps })
    }

    fn allocator() -> StoreAllocator {
        StoreAllocator::new(Arc::new(MemKvStore::new()))
    }

    #[test]
    fn valid_declaration_order_is_kept() {
        let b = RegistryBuilder::new()
            .with(f("auth", &[]))
            .with(f("bank", &["auth"]))
            .with(f("staking", &["auth", "bank"]))
            .with(f("consensus", &[]));
        assert_eq!(
            b.construction_order().unwrap(),
            vec!["auth", "bank", "staking", "consensus"]
        );
    }

    #[test]
    fn dependencies_are_moved_before_dependents() {
        let b = RegistryBuilder::new()
            .with(f("crisis", &["bank"]))
            .with(f("bank", &["auth"]))
            .with(f("auth", &[]))
            .with(f("consensus", &[]));
        assert_eq!(
            b.construction_order().unwrap(),
            vec!["auth", "bank", "crisis", "consensus"]
        );
    }

    #[test]
    fn cycle_is_reported_with_its_members() {
        let b = RegistryBuilder::new()
            .with(f("a", &["c"]))
            .with(f("b", &["a"]))
            .with(f("c", &["b"]))
            .with(f("free", &[]));
        match b.construction_order().unwrap_err() {
            ConfigurationError::DependencyCycle(cycle) => {
                assert_eq!(cycle.first(), cycle.last());
                for m in ["a", "b", "c"] {
                    assert!(cycle.iter().any(|c| c == m), "{m} missing from {cycle:?}");
                }
                assert!(!cycle.iter().any(|c| c == "free"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let b = RegistryBuilder::new().with(f("a", &["a"]));
        assert!(matches!(
            b.construction_order(),
            Err(ConfigurationError::DependencyCycle(c)) if c == vec!["a", "a"]
        ));
    }

    #[test]
    fn unknown_dependency_and_duplicate_module_are_rejected() {
        let b = RegistryBuilder::new().with(f("bank", &["auth"]));
        assert!(matches!(
            b.construction_order(),
            Err(ConfigurationError::UnknownDependency { module, dependency })
                if module == "bank" && dependency == "auth"
        ));

        let b = RegistryBuilder::new().with(f("bank", &[])).with(f("bank", &[]));
        assert!(matches!(
            b.construction_order(),
            Err(ConfigurationError::DuplicateModule(m)) if m == "bank"
        ));
    }

    #[test]
    fn build_allocates_stores_and_records_deps() {
        let alloc = allocator();
        let registry = RegistryBuilder::new()
            .with(f("bank", &["auth"]))
            .with(f("auth", &[]))
            .build_topo_sorted(&alloc, Arc::new(MapConfigProvider::new()))
            .unwrap();

        assert_eq!(registry.names(), vec!["auth", "bank"]);
        assert_eq!(registry.modules()[1].deps, vec!["auth".to_owned()]);
        assert_eq!(alloc.namespaces(), vec!["auth".to_owned(), "bank".to_owned()]);
    }

    #[test]
    fn factory_configuration_errors_pass_through_unwrapped() {
        struct Greedy;
        impl ModuleFactory for Greedy {
            fn name(&self) -> &'static str {
                "greedy"
            }
            fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
                ctx.keeper::<String>()?;
                Ok(ModuleEntry::new("greedy"))
            }
        }

        let err = RegistryBuilder::new()
            .with(Arc::new(Greedy))
            .build_topo_sorted(&allocator(), Arc::new(MapConfigProvider::new()))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UndeclaredDependency { .. }));
    }

    #[test]
    fn factory_failure_is_wrapped_with_module_name() {
        struct Broken;
        impl ModuleFactory for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }
            fn build(&self, _ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
                anyhow::bail!("no keeper today")
            }
        }

        let err = RegistryBuilder::new()
            .with(Arc::new(Broken))
            .build_topo_sorted(&allocator(), Arc::new(MapConfigProvider::new()))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ModuleConstruction { module, .. } if module == "broken"));
    }
}
