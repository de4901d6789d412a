use bank::Coin;
use chainkit::{StepCtx, TypedGenesis, ValidatorUpdate};
use serde::{Deserialize, Serialize};

use crate::domain::keeper::CrisisKeeper;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrisisGenesis {
    /// Fee charged for an on-demand invariant check.
    pub constant_fee: Coin,
}

impl Default for CrisisGenesis {
    fn default() -> Self {
        Self {
            constant_fee: Coin::new("stake", 1000),
        }
    }
}

impl TypedGenesis for CrisisKeeper {
    type Genesis = CrisisGenesis;

    fn validate(&self, genesis: &CrisisGenesis) -> anyhow::Result<()> {
        genesis.constant_fee.validate()?;
        Ok(())
    }

    fn init(&self, ctx: &StepCtx, genesis: CrisisGenesis) -> anyhow::Result<Vec<ValidatorUpdate>> {
        self.set_constant_fee(&genesis.constant_fee)?;
        if self.config().skip_genesis_invariants {
            tracing::info!("Skipping genesis invariant checks");
        } else {
            self.assert_invariants(ctx)?;
        }
        Ok(Vec::new())
    }

    fn export(&self, _ctx: &StepCtx) -> anyhow::Result<CrisisGenesis> {
        Ok(self
            .constant_fee()?
            .map(|constant_fee| CrisisGenesis { constant_fee })
            .unwrap_or_default())
    }
}
