use chainkit::{StepCtx, TypedGenesis, ValidatorUpdate};
use serde::{Deserialize, Serialize};

use crate::contract::BlockParams;
use crate::contract::error::ConsensusError;
use crate::domain::keeper::ConsensusKeeper;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsensusGenesis {
    /// Address allowed to send `update_params`.
    pub authority: String,
    pub params: BlockParams,
}

impl Default for ConsensusGenesis {
    fn default() -> Self {
        Self {
            authority: "gov".to_owned(),
            params: BlockParams::default(),
        }
    }
}

impl TypedGenesis for ConsensusKeeper {
    type Genesis = ConsensusGenesis;

    fn validate(&self, genesis: &ConsensusGenesis) -> anyhow::Result<()> {
        if genesis.authority.is_empty() {
            return Err(ConsensusError::InvalidParams("authority is empty".into()).into());
        }
        Ok(genesis.params.validate()?)
    }

    fn init(&self, _ctx: &StepCtx, genesis: ConsensusGenesis) -> anyhow::Result<Vec<ValidatorUpdate>> {
        self.set_authority(&genesis.authority)?;
        self.set_params(&genesis.params)?;
        Ok(Vec::new())
    }

    fn export(&self, _ctx: &StepCtx) -> anyhow::Result<ConsensusGenesis> {
        Ok(ConsensusGenesis {
            authority: self.authority()?,
            params: self.params()?,
        })
    }
}
