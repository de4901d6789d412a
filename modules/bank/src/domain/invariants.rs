use std::collections::{BTreeMap, BTreeSet};

use chainkit::InvariantCheck;

use crate::domain::keeper::BankKeeper;

pub const TOTAL_SUPPLY: &str = "total-supply";

/// Sum of all balances equals the recorded supply, for every denom.
pub fn total_supply(keeper: &BankKeeper) -> InvariantCheck {
    let (balances, supply) = match (keeper.balances(), keeper.supply()) {
        (Ok(b), Ok(s)) => (b, s),
        (Err(e), _) | (_, Err(e)) => {
            return InvariantCheck::broken(format!("cannot read bank state: {e}"));
        }
    };

    let mut summed: BTreeMap<String, u128> = BTreeMap::new();
    for coin in balances.iter().flat_map(|b| &b.coins) {
        *summed.entry(coin.denom.clone()).or_default() += u128::from(coin.amount);
    }
    let recorded: BTreeMap<String, u128> = supply
        .into_iter()
        .map(|c| (c.denom, u128::from(c.amount)))
        .collect();

    let denoms: BTreeSet<&String> = summed.keys().chain(recorded.keys()).collect();
    let mismatches: Vec<String> = denoms
        .into_iter()
        .filter_map(|denom| {
            let s = summed.get(denom).copied().unwrap_or(0);
            let r = recorded.get(denom).copied().unwrap_or(0);
            (s != r).then(|| format!("{denom}: balances {s}, supply {r}"))
        })
        .collect();

    if mismatches.is_empty() {
        InvariantCheck::ok(format!("total supply matches for {} denoms", recorded.len()))
    } else {
        InvariantCheck::broken(format!("total supply mismatch: {}", mismatches.join("; ")))
    }
}
