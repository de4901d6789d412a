use std::collections::BTreeMap;
use std::sync::Arc;

use auth::AccountKeeperApi;
use bank::{BankKeeperApi, Coin};
use chainkit::StoreHandle;
use parking_lot::Mutex;

use crate::contract::error::StakingError;
use crate::contract::{BondStatus, Delegation, HistoricalInfo, Params, Validator, ValidatorPower};

const PARAMS_KEY: &[u8] = b"params";
const VALIDATOR_PREFIX: &[u8] = b"v/";
const DELEGATION_PREFIX: &[u8] = b"d/";
const LAST_POWER_PREFIX: &[u8] = b"l/";
const HISTORY_PREFIX: &[u8] = b"h/";

fn validator_key(operator: &str) -> Vec<u8> {
    format!("v/{operator}").into_bytes()
}

fn delegation_key(validator: &str, delegator: &str) -> Vec<u8> {
    format!("d/{validator}/{delegator}").into_bytes()
}

fn last_power_key(operator: &str) -> Vec<u8> {
    format!("l/{operator}").into_bytes()
}

// Zero-padded so that key order is height order.
pub(crate) fn history_key(height: u64) -> Vec<u8> {
    format!("h/{height:020}").into_bytes()
}

/// Validator, delegation and history storage over the `staking` namespace.
pub struct StakingKeeper {
    pub(crate) store: StoreHandle,
    pub(crate) bank: Arc<dyn BankKeeperApi>,
    pub(crate) accounts: Arc<dyn AccountKeeperApi>,
    // Serializes token movements with the records that account for them.
    pub(crate) ops: Mutex<()>,
}

impl StakingKeeper {
    pub fn new(
        store: StoreHandle,
        bank: Arc<dyn BankKeeperApi>,
        accounts: Arc<dyn AccountKeeperApi>,
    ) -> Self {
        Self {
            store,
            bank,
            accounts,
            ops: Mutex::new(()),
        }
    }

    pub fn params(&self) -> Result<Params, StakingError> {
        Ok(self.store.get_json(PARAMS_KEY)?.unwrap_or_default())
    }

    pub(crate) fn set_params(&self, params: &Params) -> Result<(), StakingError> {
        self.store.set_json(PARAMS_KEY, params)?;
        Ok(())
    }

    pub fn validator(&self, operator: &str) -> Result<Option<Validator>, StakingError> {
        Ok(self.store.get_json(&validator_key(operator))?)
    }

    pub(crate) fn set_validator(&self, validator: &Validator) -> Result<(), StakingError> {
        self.store
            .set_json(&validator_key(&validator.operator), validator)?;
        Ok(())
    }

    /// All validators ordered by operator address.
    pub fn validators(&self) -> Result<Vec<Validator>, StakingError> {
        Ok(self
            .store
            .iter_json(VALIDATOR_PREFIX)?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    pub fn delegation(&self, validator: &str, delegator: &str) -> Result<Option<Delegation>, StakingError> {
        Ok(self.store.get_json(&delegation_key(validator, delegator))?)
    }

    pub(crate) fn set_delegation(&self, delegation: &Delegation) -> Result<(), StakingError> {
        let key = delegation_key(&delegation.validator, &delegation.delegator);
        if delegation.amount == 0 {
            self.store.delete(&key);
        } else {
            self.store.set_json(&key, delegation)?;
        }
        Ok(())
    }

    /// All delegations ordered by validator, then delegator.
    pub fn delegations(&self) -> Result<Vec<Delegation>, StakingError> {
        Ok(self
            .store
            .iter_json(DELEGATION_PREFIX)?
            .into_iter()
            .map(|(_, d)| d)
            .collect())
    }

    /// Powers as last reported to consensus, by operator.
    pub fn last_powers(&self) -> Result<BTreeMap<String, i64>, StakingError> {
        Ok(self
            .store
            .iter_json::<i64>(LAST_POWER_PREFIX)?
            .into_iter()
            .map(|(k, p)| {
                (
                    String::from_utf8_lossy(&k[LAST_POWER_PREFIX.len()..]).into_owned(),
                    p,
                )
            })
            .collect())
    }

    pub(crate) fn replace_last_powers(&self, set: &[ValidatorPower]) -> Result<(), StakingError> {
        for (k, _) in self.store.iter_prefix(LAST_POWER_PREFIX) {
            self.store.delete(&k);
        }
        for v in set {
            self.store.set_json(&last_power_key(&v.operator), &v.power)?;
        }
        Ok(())
    }

    /// Validators that should be bonded now: positive power, ranked by power
    /// then operator, capped at `max_validators`.
    pub fn bonded_set(&self) -> Result<Vec<(Validator, i64)>, StakingError> {
        let params = self.params()?;
        let mut ranked: Vec<(Validator, i64)> = self
            .validators()?
            .into_iter()
            .map(|v| {
                let power = params.power(v.tokens);
                (v, power)
            })
            .filter(|(_, power)| *power > 0)
            .collect();
        ranked.sort_by(|(a, pa), (b, pb)| pb.cmp(pa).then_with(|| a.operator.cmp(&b.operator)));
        ranked.truncate(usize::try_from(params.max_validators).unwrap_or(usize::MAX));
        Ok(ranked)
    }

    pub fn historical_info(&self, height: u64) -> Result<Option<HistoricalInfo>, StakingError> {
        Ok(self.store.get_json(&history_key(height))?)
    }

    pub(crate) fn history_heights(&self) -> Vec<Vec<u8>> {
        self.store
            .iter_prefix(HISTORY_PREFIX)
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    fn bond_coin(&self, params: &Params, coin: &Coin) -> Result<(), StakingError> {
        if coin.denom == params.bond_denom {
            Ok(())
        } else {
            Err(StakingError::WrongDenom {
                expected: params.bond_denom.clone(),
                got: coin.denom.clone(),
            })
        }
    }

    fn existing(&self, operator: &str) -> Result<Validator, StakingError> {
        self.validator(operator)?
            .ok_or_else(|| StakingError::UnknownValidator(operator.to_owned()))
    }

    /// Registers a validator funded by a self-delegation. New validators
    /// join the bonded set, if at all, at the end of the step.
    pub fn create_validator(
        &self,
        operator: &str,
        cons_pub_key: &str,
        self_delegation: &Coin,
    ) -> Result<Validator, StakingError> {
        auth::validate_address(operator)?;
        if cons_pub_key.is_empty() {
            return Err(StakingError::InvalidValidator("empty consensus key".into()));
        }
        let params = self.params()?;
        self.bond_coin(&params, self_delegation)?;

        let _guard = self.ops.lock();
        if self.validator(operator)?.is_some() {
            return Err(StakingError::ValidatorExists(operator.to_owned()));
        }
        if self.validators()?.iter().any(|v| v.cons_pub_key == cons_pub_key) {
            return Err(StakingError::DuplicatePubKey(cons_pub_key.to_owned()));
        }

        let validator = Validator {
            operator: operator.to_owned(),
            cons_pub_key: cons_pub_key.to_owned(),
            tokens: self_delegation.amount,
            status: BondStatus::Unbonded,
        };
        self.bank
            .send_from_account_to_module(operator, validator.status.pool(), self_delegation)?;
        self.set_validator(&validator)?;
        self.set_delegation(&Delegation {
            delegator: operator.to_owned(),
            validator: operator.to_owned(),
            amount: self_delegation.amount,
        })?;
        tracing::info!(operator, tokens = validator.tokens, "Validator created");
        Ok(validator)
    }

    /// Bonds tokens to a validator; they land in the pool matching its status.
    pub fn delegate(&self, delegator: &str, operator: &str, coin: &Coin) -> Result<Delegation, StakingError> {
        let params = self.params()?;
        self.bond_coin(&params, coin)?;

        let _guard = self.ops.lock();
        let mut validator = self.existing(operator)?;
        validator.tokens = validator
            .tokens
            .checked_add(coin.amount)
            .ok_or(StakingError::Overflow)?;
        let mut delegation = self.delegation(operator, delegator)?.unwrap_or(Delegation {
            delegator: delegator.to_owned(),
            validator: operator.to_owned(),
            amount: 0,
        });
        delegation.amount = delegation
            .amount
            .checked_add(coin.amount)
            .ok_or(StakingError::Overflow)?;

        self.bank
            .send_from_account_to_module(delegator, validator.status.pool(), coin)?;
        self.set_validator(&validator)?;
        self.set_delegation(&delegation)?;
        Ok(delegation)
    }

    /// Returns bonded tokens to the delegator immediately.
    pub fn undelegate(&self, delegator: &str, operator: &str, coin: &Coin) -> Result<Delegation, StakingError> {
        let params = self.params()?;
        self.bond_coin(&params, coin)?;

        let _guard = self.ops.lock();
        let mut validator = self.existing(operator)?;
        let mut delegation = self.delegation(operator, delegator)?.unwrap_or(Delegation {
            delegator: delegator.to_owned(),
            validator: operator.to_owned(),
            amount: 0,
        });
        if delegation.amount < coin.amount {
            return Err(StakingError::InsufficientDelegation {
                delegator: delegator.to_owned(),
                validator: operator.to_owned(),
                available: delegation.amount,
                required: coin.amount,
            });
        }
        delegation.amount -= coin.amount;
        validator.tokens = validator.tokens.saturating_sub(coin.amount);

        self.bank
            .send_from_module_to_account(validator.status.pool(), delegator, coin)?;
        self.set_validator(&validator)?;
        self.set_delegation(&delegation)?;
        Ok(delegation)
    }

    /// Moves a validator's tokens to the pool for `status` and records it.
    pub(crate) fn change_status(&self, validator: &mut Validator, status: BondStatus) -> Result<(), StakingError> {
        if validator.status == status {
            return Ok(());
        }
        if validator.tokens > 0 {
            let params = self.params()?;
            self.bank.send_between_modules(
                validator.status.pool(),
                status.pool(),
                &Coin::new(params.bond_denom, validator.tokens),
            )?;
        }
        validator.status = status;
        self.set_validator(validator)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::contract::NOT_BONDED_POOL;
    use crate::domain::test_support::harness;

    #[test]
    fn create_validator_escrows_self_delegation_unbonded() {
        let h = harness(&[("val1", 10)]);
        let v = h
            .keeper
            .create_validator("alice", "pk-alice", &Coin::new("stake", 40))
            .unwrap();
        assert_eq!(v.status, BondStatus::Unbonded);
        assert_eq!(h.bank.balance("alice", "stake").unwrap(), 60);
        assert_eq!(h.bank.module_balance(NOT_BONDED_POOL, "stake").unwrap(), 40);
        assert_eq!(h.keeper.delegation("alice", "alice").unwrap().unwrap().amount, 40);

        assert!(matches!(
            h.keeper.create_validator("alice", "pk-other", &Coin::new("stake", 1)),
            Err(StakingError::ValidatorExists(_))
        ));
        assert!(matches!(
            h.keeper.create_validator("bob", "pk-val1", &Coin::new("stake", 1)),
            Err(StakingError::DuplicatePubKey(_))
        ));
    }

    #[test]
    fn delegation_checks_denom_validator_and_amount() {
        let h = harness(&[("val1", 10)]);
        assert!(matches!(
            h.keeper.delegate("alice", "val1", &Coin::new("atom", 1)),
            Err(StakingError::WrongDenom { .. })
        ));
        assert!(matches!(
            h.keeper.delegate("alice", "ghost", &Coin::new("stake", 1)),
            Err(StakingError::UnknownValidator(_))
        ));
        assert!(matches!(
            h.keeper.delegate("alice", "val1", &Coin::new("stake", 101)),
            Err(StakingError::Bank(_))
        ));
        assert_eq!(h.keeper.validator("val1").unwrap().unwrap().tokens, 10);

        h.keeper
            .delegate("alice", "val1", &Coin::new("stake", 5))
            .unwrap();
        assert!(matches!(
            h.keeper.undelegate("alice", "val1", &Coin::new("stake", 6)),
            Err(StakingError::InsufficientDelegation { available: 5, required: 6, .. })
        ));
        let left = h
            .keeper
            .undelegate("alice", "val1", &Coin::new("stake", 5))
            .unwrap();
        assert_eq!(left.amount, 0);
        assert!(h.keeper.delegation("val1", "alice").unwrap().is_none());
        assert_eq!(h.bank.balance("alice", "stake").unwrap(), 100);
    }
}
