use std::sync::Arc;

use chainkit::{InvariantModule, InvariantRegistry, ModuleRouter, ServiceModule, StepCtx};
use serde::{Deserialize, Serialize};

use crate::contract::Coin;
use crate::contract::client::BankKeeperApi;
use crate::domain::invariants;
use crate::domain::keeper::BankKeeper;
use crate::module::MODULE_NAME;

#[derive(Debug, Deserialize)]
pub struct MsgSend {
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Serialize)]
pub struct MsgSendResponse;

#[derive(Debug, Deserialize)]
struct BalanceQuery {
    address: String,
    denom: String,
}

#[derive(Debug, Deserialize)]
struct AllBalancesQuery {
    address: String,
}

/// Message, query and invariant registration for the bank module.
pub struct BankServices {
    keeper: Arc<BankKeeper>,
}

impl BankServices {
    pub fn new(keeper: Arc<BankKeeper>) -> Self {
        Self { keeper }
    }
}

impl ServiceModule for BankServices {
    fn register_services(&self, router: &mut ModuleRouter<'_>) -> anyhow::Result<()> {
        let k = Arc::clone(&self.keeper);
        router.msg("send", move |_: &StepCtx, msg: MsgSend| -> anyhow::Result<MsgSendResponse> {
            if msg.amount.is_empty() {
                anyhow::bail!("send requires at least one coin");
            }
            k.send_coins(&msg.from_address, &msg.to_address, &msg.amount)?;
            Ok(MsgSendResponse)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query("balance", move |q: BalanceQuery| -> anyhow::Result<Coin> {
            let amount = k.balance(&q.address, &q.denom)?;
            Ok(Coin::new(q.denom, amount))
        })?;

        let k = Arc::clone(&self.keeper);
        router.query("all_balances", move |q: AllBalancesQuery| -> anyhow::Result<Vec<Coin>> {
            Ok(k.all_balances(&q.address)?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query("total_supply", move |_: serde_json::Value| -> anyhow::Result<Vec<Coin>> {
            Ok(k.supply()?)
        })?;
        Ok(())
    }
}

impl InvariantModule for BankServices {
    fn register_invariants(&self, registry: &InvariantRegistry) -> anyhow::Result<()> {
        let k = Arc::clone(&self.keeper);
        registry.register(MODULE_NAME, invariants::TOTAL_SUPPLY, move |_| {
            invariants::total_supply(&k)
        })?;
        Ok(())
    }
}
