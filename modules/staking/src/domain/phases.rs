use std::collections::BTreeMap;

use chainkit::{
    BeginPhaseModule, BeginPhaseRequest, EndPhaseModule, EndPhaseRequest, EndPhaseResult, Event,
    PhaseResult, StepCtx, ValidatorUpdate,
};

use crate::contract::error::StakingError;
use crate::contract::{BondStatus, HistoricalInfo, Validator, ValidatorPower};
use crate::domain::keeper::{StakingKeeper, history_key};

pub(crate) fn to_powers(set: &[(Validator, i64)]) -> Vec<ValidatorPower> {
    set.iter()
        .map(|(v, power)| ValidatorPower {
            operator: v.operator.clone(),
            cons_pub_key: v.cons_pub_key.clone(),
            power: *power,
        })
        .collect()
}

impl StakingKeeper {
    /// Snapshot of the last reported set, in rank order.
    fn last_set(&self) -> Result<Vec<ValidatorPower>, StakingError> {
        let mut set = Vec::new();
        for (operator, power) in self.last_powers()? {
            if let Some(v) = self.validator(&operator)? {
                set.push(ValidatorPower {
                    operator,
                    cons_pub_key: v.cons_pub_key,
                    power,
                });
            }
        }
        set.sort_by(|a, b| b.power.cmp(&a.power).then_with(|| a.operator.cmp(&b.operator)));
        Ok(set)
    }

    /// Stores this height's snapshot and drops those older than
    /// `historical_entries` heights.
    pub(crate) fn track_history(&self, ctx: &StepCtx) -> Result<usize, StakingError> {
        let entries = u64::from(self.params()?.historical_entries);
        if entries > 0 {
            let info = HistoricalInfo {
                height: ctx.height,
                time: ctx.time,
                valset: self.last_set()?,
            };
            self.store.set_json(&history_key(ctx.height), &info)?;
        }

        let oldest_kept = (ctx.height + 1).saturating_sub(entries);
        let cutoff = history_key(oldest_kept);
        let mut pruned = 0;
        for key in self.history_heights() {
            if key < cutoff {
                self.store.delete(&key);
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Recomputes the bonded set, moves tokens of validators entering or
    /// leaving it between pools, and returns the power changes against the
    /// last reported set.
    pub fn apply_validator_set_changes(&self) -> Result<Vec<ValidatorUpdate>, StakingError> {
        let _guard = self.ops.lock();
        let mut last: BTreeMap<String, i64> = self.last_powers()?;
        let bonded = self.bonded_set()?;
        let mut updates = Vec::new();

        for (validator, power) in &bonded {
            if last.remove(&validator.operator) != Some(*power) {
                updates.push(ValidatorUpdate {
                    pub_key: validator.cons_pub_key.clone(),
                    power: *power,
                });
            }
            if validator.status != BondStatus::Bonded {
                let mut v = validator.clone();
                self.change_status(&mut v, BondStatus::Bonded)?;
                tracing::info!(operator = %v.operator, power, "Validator bonded");
            }
        }

        // Whatever is left in `last` dropped out of the set.
        for operator in last.keys() {
            let Some(mut v) = self.validator(operator)? else {
                continue;
            };
            updates.push(ValidatorUpdate {
                pub_key: v.cons_pub_key.clone(),
                power: 0,
            });
            self.change_status(&mut v, BondStatus::Unbonded)?;
            tracing::info!(operator = %v.operator, "Validator unbonded");
        }

        self.replace_last_powers(&to_powers(&bonded))?;
        Ok(updates)
    }
}

impl BeginPhaseModule for StakingKeeper {
    fn begin_phase(&self, ctx: &StepCtx, _req: &BeginPhaseRequest) -> anyhow::Result<PhaseResult> {
        let pruned = self.track_history(ctx)?;
        Ok(PhaseResult::with_events(vec![
            Event::new("historical_info")
                .attr("height", ctx.height)
                .attr("pruned", pruned),
        ]))
    }
}

impl EndPhaseModule for StakingKeeper {
    fn end_phase(&self, ctx: &StepCtx, _req: &EndPhaseRequest) -> anyhow::Result<EndPhaseResult> {
        let validator_updates = self.apply_validator_set_changes()?;
        if !validator_updates.is_empty() {
            tracing::debug!(
                height = ctx.height,
                updates = validator_updates.len(),
                "Validator set changed"
            );
        }
        let events = validator_updates
            .iter()
            .map(|u| {
                Event::new("power_change")
                    .attr("pub_key", &u.pub_key)
                    .attr("power", u.power)
            })
            .collect();
        Ok(EndPhaseResult {
            events,
            validator_updates,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::contract::{BONDED_POOL, NOT_BONDED_POOL};
    use crate::domain::test_support::{ctx, harness};
    use bank::Coin;

    fn update(key: &str, power: i64) -> ValidatorUpdate {
        ValidatorUpdate {
            pub_key: key.to_owned(),
            power,
        }
    }

    #[test]
    fn genesis_reports_bonded_set_capped_at_max_validators() {
        // max_validators = 2
        let h = harness(&[("val1", 10), ("val2", 30), ("val3", 20)]);
        assert_eq!(h.genesis_updates, vec![update("pk-val2", 30), update("pk-val3", 20)]);
        assert_eq!(
            h.keeper.validator("val1").unwrap().unwrap().status,
            BondStatus::Unbonded
        );
        assert_eq!(h.bank.module_balance(BONDED_POOL, "stake").unwrap(), 50);
        assert_eq!(h.bank.module_balance(NOT_BONDED_POOL, "stake").unwrap(), 10);
    }

    #[test]
    fn end_phase_without_changes_reports_nothing() {
        let h = harness(&[("val1", 10)]);
        assert!(h.keeper.apply_validator_set_changes().unwrap().is_empty());
    }

    #[test]
    fn delegation_changes_power_and_can_displace_a_validator() {
        let h = harness(&[("val1", 10), ("val2", 30), ("val3", 20)]);

        h.keeper
            .delegate("alice", "val1", &Coin::new("stake", 25))
            .unwrap();
        // val1 is unbonded, so the tokens wait in the not-bonded pool.
        assert_eq!(h.bank.module_balance(NOT_BONDED_POOL, "stake").unwrap(), 35);

        let updates = h.keeper.apply_validator_set_changes().unwrap();
        assert_eq!(updates, vec![update("pk-val1", 35), update("pk-val3", 0)]);
        assert_eq!(
            h.keeper.validator("val3").unwrap().unwrap().status,
            BondStatus::Unbonded
        );
        assert_eq!(h.bank.module_balance(BONDED_POOL, "stake").unwrap(), 65);
        assert_eq!(h.bank.module_balance(NOT_BONDED_POOL, "stake").unwrap(), 20);
    }

    #[test]
    fn undelegating_everything_removes_validator_from_set() {
        let h = harness(&[("val1", 10), ("val2", 30)]);
        h.keeper
            .undelegate("val1", "val1", &Coin::new("stake", 10))
            .unwrap();
        assert_eq!(h.bank.balance("val1", "stake").unwrap(), 10);

        let updates = h.keeper.apply_validator_set_changes().unwrap();
        assert_eq!(updates, vec![update("pk-val1", 0)]);
        assert!(h.keeper.last_powers().unwrap().get("val1").is_none());
    }

    #[test]
    fn history_is_recorded_and_pruned() {
        // historical_entries = 2
        let h = harness(&[("val1", 10)]);
        for height in 1..=4 {
            h.keeper.track_history(&ctx(height)).unwrap();
        }
        assert!(h.keeper.historical_info(2).unwrap().is_none());
        let info = h.keeper.historical_info(4).unwrap().unwrap();
        assert_eq!(info.valset.len(), 1);
        assert_eq!(info.valset[0].power, 10);
        assert!(h.keeper.historical_info(3).unwrap().is_some());
    }
}
