use std::sync::Arc;

use auth::AccountKeeperApi;
use chainkit::{BuildCtx, ModuleEntry, ModuleFactory};

use crate::api::services::BankServices;
use crate::contract::client::BankKeeperApi;
use crate::domain::keeper::BankKeeper;

pub const MODULE_NAME: &str = "bank";
pub const STORE_KEY: &str = "bank";

/// Bank module factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct BankModule;

impl ModuleFactory for BankModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &[auth::MODULE_NAME]
    }

    fn store_keys(&self) -> Vec<&'static str> {
        vec![STORE_KEY]
    }

    fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
        let accounts = ctx.keeper::<dyn AccountKeeperApi>()?;
        let keeper = Arc::new(BankKeeper::new(ctx.store(STORE_KEY)?, accounts));
        ctx.provide::<dyn BankKeeperApi>(keeper.clone())?;

        let services = Arc::new(BankServices::new(Arc::clone(&keeper)));
        tracing::info!("Bank module initialized");
        Ok(ModuleEntry::new(MODULE_NAME)
            .with_typed_genesis(keeper)
            .with_services(services.clone())
            .with_invariants(services))
    }
}
