use std::sync::Arc;

use bank::Coin;
use chainkit::{InvariantModule, InvariantRegistry, ModuleRouter, ServiceModule, StepCtx};
use serde::Deserialize;

use crate::contract::{Delegation, HistoricalInfo, Params, Validator};
use crate::domain::invariants;
use crate::domain::keeper::StakingKeeper;
use crate::module::MODULE_NAME;

#[derive(Debug, Deserialize)]
pub struct MsgCreateValidator {
    pub operator: String,
    pub cons_pub_key: String,
    pub self_delegation: Coin,
}

#[derive(Debug, Deserialize)]
pub struct MsgDelegate {
    pub delegator: String,
    pub validator: String,
    pub amount: Coin,
}

#[derive(Debug, Deserialize)]
struct ValidatorQuery {
    operator: String,
}

#[derive(Debug, Deserialize)]
struct HistoricalInfoQuery {
    height: u64,
}

pub struct StakingServices {
    keeper: Arc<StakingKeeper>,
}

impl StakingServices {
    pub fn new(keeper: Arc<StakingKeeper>) -> Self {
        Self { keeper }
    }
}

impl ServiceModule for StakingServices {
    fn register_services(&self, router: &mut ModuleRouter<'_>) -> anyhow::Result<()> {
        let k = Arc::clone(&self.keeper);
        router.msg(
            "create_validator",
            move |_: &StepCtx, m: MsgCreateValidator| -> anyhow::Result<Validator> {
                Ok(k.create_validator(&m.operator, &m.cons_pub_key, &m.self_delegation)?)
            },
        )?;

        let k = Arc::clone(&self.keeper);
        router.msg("delegate", move |_: &StepCtx, m: MsgDelegate| -> anyhow::Result<Delegation> {
            Ok(k.delegate(&m.delegator, &m.validator, &m.amount)?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.msg("undelegate", move |_: &StepCtx, m: MsgDelegate| -> anyhow::Result<Delegation> {
            Ok(k.undelegate(&m.delegator, &m.validator, &m.amount)?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query("validator", move |q: ValidatorQuery| -> anyhow::Result<Option<Validator>> {
            Ok(k.validator(&q.operator)?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query("validators", move |_: serde_json::Value| -> anyhow::Result<Vec<Validator>> {
            Ok(k.validators()?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query("params", move |_: serde_json::Value| -> anyhow::Result<Params> {
            Ok(k.params()?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query(
            "historical_info",
            move |q: HistoricalInfoQuery| -> anyhow::Result<Option<HistoricalInfo>> {
                Ok(k.historical_info(q.height)?)
            },
        )?;
        Ok(())
    }
}

impl InvariantModule for StakingServices {
    fn register_invariants(&self, registry: &InvariantRegistry) -> anyhow::Result<()> {
        let k = Arc::clone(&self.keeper);
        registry.register(MODULE_NAME, invariants::BONDED_POOL_ROUTE, move |_| {
            invariants::bonded_pool(&k)
        })?;
        let k = Arc::clone(&self.keeper);
        registry.register(MODULE_NAME, invariants::DELEGATIONS_ROUTE, move |_| {
            invariants::delegations(&k)
        })?;
        Ok(())
    }
}
