use std::collections::BTreeMap;
use std::sync::Arc;

use chainkit::{BuildCtx, ModuleEntry, ModuleFactory};

use crate::api::services::AuthServices;
use crate::contract::Permission;
use crate::contract::client::AccountKeeperApi;
use crate::domain::keeper::AccountKeeper;

pub const MODULE_NAME: &str = "auth";
pub const STORE_KEY: &str = "acc";

/// Accounts module factory.
///
/// The module account table is fixed at construction: only names added
/// with [`AuthModule::with_module_account`] can ever own a module account.
#[derive(Debug, Clone, Default)]
pub struct AuthModule {
    permissions: BTreeMap<String, Vec<Permission>>,
}

impl AuthModule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module_account(mut self, name: &str, permissions: &[Permission]) -> Self {
        self.permissions
            .insert(name.to_owned(), permissions.to_vec());
        self
    }
}

impl ModuleFactory for AuthModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn store_keys(&self) -> Vec<&'static str> {
        vec![STORE_KEY]
    }

    fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
        let keeper = Arc::new(AccountKeeper::new(
            ctx.store(STORE_KEY)?,
            self.permissions.clone(),
        ));
        ctx.provide::<dyn AccountKeeperApi>(keeper.clone())?;

        tracing::info!(
            module_accounts = self.permissions.len(),
            "Accounts module initialized"
        );
        Ok(ModuleEntry::new(MODULE_NAME)
            .with_typed_genesis(Arc::clone(&keeper))
            .with_services(Arc::new(AuthServices::new(keeper))))
    }
}
