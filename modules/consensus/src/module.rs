use std::sync::Arc;

use chainkit::{BuildCtx, ModuleEntry, ModuleFactory};

use crate::api::services::ConsensusServices;
use crate::domain::keeper::ConsensusKeeper;

pub const MODULE_NAME: &str = "consensus";
pub const STORE_KEY: &str = "consensus";

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusModule;

impl ModuleFactory for ConsensusModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn build(&self, ctx: &BuildCtx) -> anyhow::Result<ModuleEntry> {
        let keeper = Arc::new(ConsensusKeeper::new(ctx.store(STORE_KEY)?));
        Ok(ModuleEntry::new(MODULE_NAME)
            .with_typed_genesis(Arc::clone(&keeper))
            .with_services(Arc::new(ConsensusServices::new(keeper))))
    }
}
