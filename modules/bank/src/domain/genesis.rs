use std::collections::{BTreeMap, HashSet};

use chainkit::{StepCtx, TypedGenesis, ValidatorUpdate};
use serde::{Deserialize, Serialize};

use crate::contract::error::BankError;
use crate::contract::{Balance, Coin};
use crate::domain::keeper::BankKeeper;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BankGenesis {
    pub balances: Vec<Balance>,
    /// Derived from `balances` when empty; must match them otherwise.
    pub supply: Vec<Coin>,
}

impl BankGenesis {
    /// Per-denom sum of all balances.
    ///
    /// # Errors
    /// Invalid coins or addresses, duplicate entries, or overflow.
    pub fn computed_supply(&self) -> Result<BTreeMap<String, u64>, BankError> {
        let mut seen = HashSet::new();
        let mut supply: BTreeMap<String, u64> = BTreeMap::new();
        for balance in &self.balances {
            auth::validate_address(&balance.address)?;
            if !seen.insert(balance.address.as_str()) {
                return Err(BankError::DuplicateBalance(balance.address.clone()));
            }
            let mut denoms = HashSet::new();
            for coin in &balance.coins {
                coin.validate()?;
                if !denoms.insert(coin.denom.as_str()) {
                    return Err(BankError::DuplicateBalance(format!(
                        "{}/{}",
                        balance.address, coin.denom
                    )));
                }
                let total = supply.entry(coin.denom.clone()).or_default();
                *total = total
                    .checked_add(coin.amount)
                    .ok_or_else(|| BankError::Overflow(coin.denom.clone()))?;
            }
        }
        Ok(supply)
    }

    /// Supply to record: computed, after checking any declared supply
    /// against it.
    ///
    /// # Errors
    /// As [`Self::computed_supply`], or `SupplyMismatch`.
    pub fn resolved_supply(&self) -> Result<BTreeMap<String, u64>, BankError> {
        let computed = self.computed_supply()?;
        if self.supply.is_empty() {
            return Ok(computed);
        }
        let mut declared: BTreeMap<&str, u64> = BTreeMap::new();
        for coin in &self.supply {
            coin.validate()?;
            if declared.insert(coin.denom.as_str(), coin.amount).is_some() {
                return Err(BankError::InvalidCoin(format!(
                    "supply lists {} twice",
                    coin.denom
                )));
            }
        }
        let denoms: std::collections::BTreeSet<&str> = declared
            .keys()
            .copied()
            .chain(computed.keys().map(String::as_str))
            .collect();
        for denom in denoms {
            let d = declared.get(denom).copied().unwrap_or(0);
            let a = computed.get(denom).copied().unwrap_or(0);
            if d != a {
                return Err(BankError::SupplyMismatch {
                    denom: denom.to_owned(),
                    declared: d,
                    actual: a,
                });
            }
        }
        Ok(computed)
    }
}

impl TypedGenesis for BankKeeper {
    type Genesis = BankGenesis;

    fn validate(&self, genesis: &BankGenesis) -> anyhow::Result<()> {
        genesis.resolved_supply()?;
        Ok(())
    }

    fn init(&self, _ctx: &StepCtx, genesis: BankGenesis) -> anyhow::Result<Vec<ValidatorUpdate>> {
        let supply = genesis.resolved_supply()?;
        for balance in &genesis.balances {
            for coin in &balance.coins {
                self.set_balance(&balance.address, &coin.denom, coin.amount)?;
            }
        }
        for (denom, amount) in &supply {
            self.set_supply(denom, *amount)?;
        }
        tracing::info!(
            balances = genesis.balances.len(),
            denoms = supply.len(),
            "Balances loaded from genesis"
        );
        Ok(Vec::new())
    }

    fn export(&self, _ctx: &StepCtx) -> anyhow::Result<BankGenesis> {
        Ok(BankGenesis {
            balances: self.balances()?,
            supply: self.supply()?,
        })
    }
}
