use std::collections::BTreeMap;

use chainkit::InvariantCheck;

use crate::contract::{BONDED_POOL, BondStatus};
use crate::domain::keeper::StakingKeeper;

pub const BONDED_POOL_ROUTE: &str = "bonded-pool";
pub const DELEGATIONS_ROUTE: &str = "delegations";

fn bonded_totals(keeper: &StakingKeeper) -> Result<(u64, u128), crate::StakingError> {
    let params = keeper.params()?;
    let balance = keeper.bank.module_balance(BONDED_POOL, &params.bond_denom)?;
    let bonded = keeper
        .validators()?
        .iter()
        .filter(|v| v.status == BondStatus::Bonded)
        .map(|v| u128::from(v.tokens))
        .sum();
    Ok((balance, bonded))
}

/// Bonded pool balance equals the tokens of all bonded validators.
pub fn bonded_pool(keeper: &StakingKeeper) -> InvariantCheck {
    match bonded_totals(keeper) {
        Ok((balance, bonded)) if u128::from(balance) == bonded => {
            InvariantCheck::ok(format!("bonded pool holds {balance}"))
        }
        Ok((balance, bonded)) => InvariantCheck::broken(format!(
            "bonded pool holds {balance}, bonded validators hold {bonded}"
        )),
        Err(e) => InvariantCheck::broken(format!("cannot read staking state: {e}")),
    }
}

/// Each validator's tokens equal the sum of delegations to it.
pub fn delegations(keeper: &StakingKeeper) -> InvariantCheck {
    let (validators, delegations) = match (keeper.validators(), keeper.delegations()) {
        (Ok(v), Ok(d)) => (v, d),
        (Err(e), _) | (_, Err(e)) => {
            return InvariantCheck::broken(format!("cannot read staking state: {e}"));
        }
    };
    let mut delegated: BTreeMap<&str, u128> = BTreeMap::new();
    for d in &delegations {
        *delegated.entry(d.validator.as_str()).or_default() += u128::from(d.amount);
    }
    let broken: Vec<String> = validators
        .iter()
        .filter_map(|v| {
            let sum = delegated.get(v.operator.as_str()).copied().unwrap_or(0);
            (sum != u128::from(v.tokens))
                .then(|| format!("{}: tokens {}, delegated {sum}", v.operator, v.tokens))
        })
        .collect();
    if broken.is_empty() {
        InvariantCheck::ok(format!("{} validators consistent", validators.len()))
    } else {
        InvariantCheck::broken(broken.join("; "))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::test_support::harness;
    use bank::Coin;

    #[test]
    fn hold_through_delegation_and_set_changes() {
        let h = harness(&[("val1", 10), ("val2", 30), ("val3", 20)]);
        assert!(!bonded_pool(&h.keeper).broken);

        h.keeper
            .delegate("alice", "val3", &Coin::new("stake", 40))
            .unwrap();
        h.keeper.apply_validator_set_changes().unwrap();
        assert!(!bonded_pool(&h.keeper).broken);
        assert!(!delegations(&h.keeper).broken);
    }

    #[test]
    fn bonded_pool_breaks_when_funds_leave_the_pool() {
        let h = harness(&[("val1", 10)]);
        h.bank
            .send_between_modules(BONDED_POOL, crate::NOT_BONDED_POOL, &Coin::new("stake", 1))
            .unwrap();
        let check = bonded_pool(&h.keeper);
        assert!(check.broken);
        assert!(check.message.contains("holds 9"));
    }
}
