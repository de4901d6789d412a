use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::{ConfigError, ConfigProvider, module_config_or_default, module_config_required};
use crate::error::ConfigurationError;
use crate::keeper_hub::{KeeperHub, KeeperHubError, TypeKey};
use crate::store::StoreHandle;

/// Construction context handed to a module factory.
///
/// Gives the module under construction exactly what it is entitled to:
/// - its own store handles, one per declared store key;
/// - keepers of the modules it declared as dependencies;
/// - its configuration section.
///
/// ```ignore
/// fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
///     let store = ctx.store("bank")?;
///     let accounts = ctx.keeper::<dyn AccountKeeperApi>()?;
///     let keeper = Arc::new(BankKeeper::new(store, accounts));
///     ctx.provide::<dyn BankKeeperApi>(keeper.clone())?;
///     Ok(ModuleEntry::new(ctx.module_name()).with_services(keeper))
/// }
/// ```
pub struct BuildCtx {
    module_name: Arc<str>,
    dependencies: Vec<String>,
    stores: Vec<StoreHandle>,
    keepers: Arc<KeeperHub>,
    config_provider: Arc<dyn ConfigProvider>,
}

impl BuildCtx {
    pub(crate) fn new(
        module_name: &str,
        dependencies: Vec<String>,
        stores: Vec<StoreHandle>,
        keepers: Arc<KeeperHub>,
        config_provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            module_name: Arc::from(module_name),
            dependencies,
            stores,
            keepers,
            config_provider,
        }
    }

    #[inline]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    #[inline]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Handle for one of this module's declared store keys.
    ///
    /// # Errors
    /// If `key` was not declared by the module's factory.
    pub fn store(&self, key: &str) -> anyhow::Result<StoreHandle> {
        self.stores
            .iter()
            .find(|s| s.namespace() == key)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "module '{}' did not declare store key '{key}'",
                    self.module_name
                )
            })
    }

    /// Keeper published by one of this module's declared dependencies.
    ///
    /// # Errors
    /// `ConfigurationError::UndeclaredDependency` if no declared dependency
    /// provides `T`.
    pub fn keeper<T>(&self) -> Result<Arc<T>, ConfigurationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let undeclared = || ConfigurationError::UndeclaredDependency {
            module: self.module_name.to_string(),
            keeper: TypeKey::of::<T>().name().to_owned(),
        };
        match self.keepers.get_with_owner::<T>() {
            Ok((keeper, owner)) if self.dependencies.iter().any(|d| **d == *owner) => Ok(keeper),
            Ok(_) | Err(KeeperHubError::NotFound(_) | KeeperHubError::TypeMismatch(_)) => {
                Err(undeclared())
            }
        }
    }

    /// Publishes this module's keeper for modules that depend on it.
    ///
    /// # Errors
    /// `ConfigurationError::DuplicateKeeper` if `T` is already provided.
    pub fn provide<T>(&self, keeper: Arc<T>) -> Result<(), ConfigurationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.keepers.provide::<T>(&self.module_name, keeper)
    }

    /// Module config section, or defaults when absent.
    ///
    /// # Errors
    /// `ConfigError::InvalidConfig` if the section is present but invalid.
    pub fn config<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
        module_config_or_default(self.config_provider.as_ref(), &self.module_name)
    }

    /// Module config section that must be present.
    ///
    /// # Errors
    /// Any `ConfigError` variant.
    pub fn config_required<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        module_config_required(self.config_provider.as_ref(), &self.module_name)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::MapConfigProvider;
    use crate::store::{MemKvStore, StoreAllocator};
    use serde::Deserialize;
    use serde_json::json;

    trait AccountApi: Send + Sync {}
    struct Accounts;
    impl AccountApi for Accounts {}

    fn ctx(module: &str, deps: &[&str], hub: &Arc<KeeperHub>) -> BuildCtx {
        let alloc = StoreAllocator::new(Arc::new(MemKvStore::new()));
        BuildCtx::new(
            module,
            deps.iter().map(|d| (*d).to_owned()).collect(),
            alloc.allocate(&[module]).unwrap(),
            hub.clone(),
            Arc::new(MapConfigProvider::new().with_config("bank", json!({ "send_enabled": false }))),
        )
    }

    #[test]
    fn keeper_resolves_only_from_declared_dependencies() {
        let hub = Arc::new(KeeperHub::new());
        ctx("auth", &[], &hub)
            .provide::<dyn AccountApi>(Arc::new(Accounts))
            .unwrap();

        assert!(ctx("bank", &["auth"], &hub).keeper::<dyn AccountApi>().is_ok());

        let err = ctx("crisis", &["staking"], &hub)
            .keeper::<dyn AccountApi>()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigurationError::UndeclaredDependency { ref module, .. } if module == "crisis"
        ));
    }

    #[test]
    fn missing_keeper_is_undeclared_dependency() {
        let hub = Arc::new(KeeperHub::new());
        let err = ctx("bank", &["auth"], &hub)
            .keeper::<dyn AccountApi>()
            .err()
            .unwrap();
        assert!(err.to_string().contains("AccountApi"));
    }

    #[test]
    fn store_returns_only_declared_keys() {
        let hub = Arc::new(KeeperHub::new());
        let c = ctx("bank", &[], &hub);
        assert_eq!(c.store("bank").unwrap().namespace(), "bank");
        assert!(c.store("acc").is_err());
    }

    #[test]
    fn config_reads_module_section() {
        #[derive(Deserialize)]
        struct BankConfig {
            send_enabled: bool,
        }
        impl Default for BankConfig {
            fn default() -> Self {
                Self { send_enabled: true }
            }
        }

        let hub = Arc::new(KeeperHub::new());
        assert!(!ctx("bank", &[], &hub).config::<BankConfig>().unwrap().send_enabled);
        assert!(ctx("auth", &[], &hub).config::<BankConfig>().unwrap().send_enabled);
        assert!(ctx("auth", &[], &hub).config_required::<BankConfig>().is_err());
    }
}
