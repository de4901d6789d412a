use std::sync::Arc;

use bank::BankKeeperApi;
use chainkit::{BuildCtx, InvariantRegistry, ModuleEntry, ModuleFactory};

use crate::api::services::CrisisServices;
use crate::config::CrisisConfig;
use crate::domain::keeper::CrisisKeeper;

pub const MODULE_NAME: &str = "crisis";
pub const STORE_KEY: &str = "crisis";

/// Crisis module factory. Checks the invariants held by `invariants`, which
/// the application fills through `Manager::register_invariants`.
#[derive(Debug, Clone)]
pub struct CrisisModule {
    invariants: Arc<InvariantRegistry>,
}

impl CrisisModule {
    pub fn new(invariants: Arc<InvariantRegistry>) -> Self {
        Self { invariants }
    }
}

impl ModuleFactory for CrisisModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &[bank::MODULE_NAME]
    }

    fn store_keys(&self) -> Vec<&'static str> {
        vec![STORE_KEY]
    }

    fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
        let config: CrisisConfig = ctx.config()?;
        tracing::info!(
            inv_check_period = config.inv_check_period,
            skip_genesis_invariants = config.skip_genesis_invariants,
            "Crisis module initialized"
        );
        let keeper = Arc::new(CrisisKeeper::new(
            ctx.store(STORE_KEY)?,
            ctx.keeper::<dyn BankKeeperApi>()?,
            Arc::clone(&self.invariants),
            config,
        ));
        Ok(ModuleEntry::new(MODULE_NAME)
            .with_typed_genesis(Arc::clone(&keeper))
            .with_end(keeper.clone())
            .with_services(Arc::new(CrisisServices::new(keeper))))
    }
}
