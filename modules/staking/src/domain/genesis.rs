use std::collections::{BTreeMap, HashSet};

use chainkit::{StepCtx, TypedGenesis, ValidatorUpdate};
use serde::{Deserialize, Serialize};

use crate::contract::error::StakingError;
use crate::contract::{BONDED_POOL, BondStatus, Delegation, NOT_BONDED_POOL, Params, Validator};
use crate::domain::keeper::StakingKeeper;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StakingGenesis {
    pub params: Params,
    /// `status` is recomputed from the bonded set on import.
    pub validators: Vec<Validator>,
    pub delegations: Vec<Delegation>,
}

fn invalid(msg: String) -> StakingError {
    StakingError::InvalidGenesis(msg)
}

impl StakingGenesis {
    /// # Errors
    /// Bad params, duplicate validators or keys, dangling or duplicate
    /// delegations, or validator tokens that differ from their delegations.
    pub fn validate(&self) -> Result<(), StakingError> {
        self.params.validate()?;

        let mut operators = HashSet::new();
        let mut keys = HashSet::new();
        for v in &self.validators {
            auth::validate_address(&v.operator)?;
            if !operators.insert(v.operator.as_str()) {
                return Err(invalid(format!("duplicate validator {}", v.operator)));
            }
            if v.cons_pub_key.is_empty() || !keys.insert(v.cons_pub_key.as_str()) {
                return Err(invalid(format!(
                    "missing or duplicate consensus key for {}",
                    v.operator
                )));
            }
        }

        let mut delegated: BTreeMap<&str, u64> = BTreeMap::new();
        let mut pairs = HashSet::new();
        for d in &self.delegations {
            auth::validate_address(&d.delegator)?;
            if !operators.contains(d.validator.as_str()) {
                return Err(invalid(format!(
                    "delegation from {} to unknown validator {}",
                    d.delegator, d.validator
                )));
            }
            if d.amount == 0 || !pairs.insert((d.delegator.as_str(), d.validator.as_str())) {
                return Err(invalid(format!(
                    "empty or duplicate delegation from {} to {}",
                    d.delegator, d.validator
                )));
            }
            let total = delegated.entry(d.validator.as_str()).or_default();
            *total = total.checked_add(d.amount).ok_or(StakingError::Overflow)?;
        }

        for v in &self.validators {
            let sum = delegated.get(v.operator.as_str()).copied().unwrap_or(0);
            if sum != v.tokens {
                return Err(invalid(format!(
                    "validator {} has {} tokens but {} delegated",
                    v.operator, v.tokens, sum
                )));
            }
        }
        Ok(())
    }
}

impl StakingKeeper {
    fn check_pool(&self, pool: &str, denom: &str, expected: u64) -> Result<(), StakingError> {
        let actual = self.bank.module_balance(pool, denom)?;
        if actual == expected {
            Ok(())
        } else {
            Err(StakingError::PoolMismatch {
                pool: pool.to_owned(),
                expected,
                actual,
            })
        }
    }
}

impl TypedGenesis for StakingKeeper {
    type Genesis = StakingGenesis;

    fn validate(&self, genesis: &StakingGenesis) -> anyhow::Result<()> {
        Ok(genesis.validate()?)
    }

    fn init(&self, _ctx: &StepCtx, genesis: StakingGenesis) -> anyhow::Result<Vec<ValidatorUpdate>> {
        self.accounts.module_account(BONDED_POOL)?;
        self.accounts.module_account(NOT_BONDED_POOL)?;
        self.set_params(&genesis.params)?;
        for v in &genesis.validators {
            self.set_validator(&Validator {
                status: BondStatus::Unbonded,
                ..v.clone()
            })?;
        }
        for d in &genesis.delegations {
            self.set_delegation(d)?;
        }

        let bonded = self.bonded_set()?;
        let mut bonded_tokens: u64 = 0;
        for (v, _) in &bonded {
            self.set_validator(&Validator {
                status: BondStatus::Bonded,
                ..v.clone()
            })?;
            bonded_tokens = bonded_tokens.checked_add(v.tokens).ok_or(StakingError::Overflow)?;
        }
        let all_tokens = genesis
            .validators
            .iter()
            .try_fold(0u64, |acc, v| acc.checked_add(v.tokens))
            .ok_or(StakingError::Overflow)?;

        let denom = &genesis.params.bond_denom;
        self.check_pool(BONDED_POOL, denom, bonded_tokens)?;
        self.check_pool(NOT_BONDED_POOL, denom, all_tokens - bonded_tokens)?;

        let set = crate::domain::phases::to_powers(&bonded);
        self.replace_last_powers(&set)?;

        tracing::info!(
            validators = genesis.validators.len(),
            bonded = set.len(),
            "Staking state loaded from genesis"
        );
        Ok(set
            .into_iter()
            .map(|v| ValidatorUpdate {
                pub_key: v.cons_pub_key,
                power: v.power,
            })
            .collect())
    }

    fn export(&self, _ctx: &StepCtx) -> anyhow::Result<StakingGenesis> {
        Ok(StakingGenesis {
            params: self.params()?,
            validators: self.validators()?,
            delegations: self.delegations()?,
        })
    }
}
