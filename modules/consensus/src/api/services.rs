use std::sync::Arc;

use chainkit::{ModuleRouter, ServiceModule, StepCtx};
use serde::{Deserialize, Serialize};

use crate::contract::BlockParams;
use crate::domain::keeper::ConsensusKeeper;

#[derive(Debug, Deserialize)]
pub struct MsgUpdateParams {
    pub authority: String,
    pub block: BlockParams,
}

#[derive(Debug, Serialize)]
pub struct MsgUpdateParamsResponse;

pub struct ConsensusServices {
    keeper: Arc<ConsensusKeeper>,
}

impl ConsensusServices {
    pub fn new(keeper: Arc<ConsensusKeeper>) -> Self {
        Self { keeper }
    }
}

impl ServiceModule for ConsensusServices {
    fn register_services(&self, router: &mut ModuleRouter<'_>) -> anyhow::Result<()> {
        let k = Arc::clone(&self.keeper);
        router.msg(
            "update_params",
            move |_: &StepCtx, m: MsgUpdateParams| -> anyhow::Result<MsgUpdateParamsResponse> {
                k.update_params(&m.authority, &m.block)?;
                Ok(MsgUpdateParamsResponse)
            },
        )?;

        let k = Arc::clone(&self.keeper);
        router.query("params", move |_: serde_json::Value| -> anyhow::Result<BlockParams> {
            Ok(k.params()?)
        })?;
        Ok(())
    }
}
