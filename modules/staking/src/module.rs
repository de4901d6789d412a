use std::sync::Arc;

use auth::AccountKeeperApi;
use bank::BankKeeperApi;
use chainkit::{BuildCtx, ModuleEntry, ModuleFactory};

use crate::api::services::StakingServices;
use crate::domain::keeper::StakingKeeper;

pub const MODULE_NAME: &str = "staking";
pub const STORE_KEY: &str = "staking";

/// Staking module factory.
///
/// Requires the `bonded_tokens_pool` and `not_bonded_tokens_pool` module
/// accounts in the accounts module's permission table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StakingModule;

impl ModuleFactory for StakingModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &[auth::MODULE_NAME, bank::MODULE_NAME]
    }

    fn store_keys(&self) -> Vec<&'static str> {
        vec![STORE_KEY]
    }

    fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
        let keeper = Arc::new(StakingKeeper::new(
            ctx.store(STORE_KEY)?,
            ctx.keeper::<dyn BankKeeperApi>()?,
            ctx.keeper::<dyn AccountKeeperApi>()?,
        ));
        ctx.provide::<StakingKeeper>(Arc::clone(&keeper))?;

        let services = Arc::new(StakingServices::new(Arc::clone(&keeper)));
        tracing::info!("Staking module initialized");
        Ok(ModuleEntry::new(MODULE_NAME)
            .with_typed_genesis(Arc::clone(&keeper))
            .with_begin(keeper.clone())
            .with_end(keeper)
            .with_services(services.clone())
            .with_invariants(services))
    }
}
