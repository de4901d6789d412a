use std::sync::Arc;

use bank::{BankKeeperApi, Coin};
use chainkit::invariant::InvariantOutcome;
use chainkit::{
    EndPhaseModule, EndPhaseRequest, EndPhaseResult, Event, InvariantRegistry,
    InvariantViolation, StepCtx, StoreHandle,
};

use crate::config::CrisisConfig;
use crate::contract::error::CrisisError;

const CONSTANT_FEE_KEY: &[u8] = b"constant_fee";

pub struct CrisisKeeper {
    store: StoreHandle,
    bank: Arc<dyn BankKeeperApi>,
    invariants: Arc<InvariantRegistry>,
    config: CrisisConfig,
}

impl CrisisKeeper {
    pub fn new(
        store: StoreHandle,
        bank: Arc<dyn BankKeeperApi>,
        invariants: Arc<InvariantRegistry>,
        config: CrisisConfig,
    ) -> Self {
        Self {
            store,
            bank,
            invariants,
            config,
        }
    }

    pub fn config(&self) -> &CrisisConfig {
        &self.config
    }

    pub fn constant_fee(&self) -> Result<Option<Coin>, CrisisError> {
        Ok(self.store.get_json(CONSTANT_FEE_KEY)?)
    }

    pub(crate) fn set_constant_fee(&self, fee: &Coin) -> Result<(), CrisisError> {
        self.store.set_json(CONSTANT_FEE_KEY, fee)?;
        Ok(())
    }

    /// Runs every invariant; the first broken one is an error.
    pub fn assert_invariants(&self, ctx: &StepCtx) -> Result<usize, InvariantViolation> {
        self.invariants.assert_all(ctx)?;
        tracing::info!(
            height = ctx.height,
            invariants = self.invariants.len(),
            "Asserted all invariants"
        );
        Ok(self.invariants.len())
    }

    /// Charges the constant fee to `sender`, then checks one invariant.
    ///
    /// # Errors
    /// Unknown route (nothing charged), failure to pay, or a broken invariant.
    pub fn verify_invariant(
        &self,
        ctx: &StepCtx,
        sender: &str,
        route: &str,
    ) -> Result<InvariantOutcome, CrisisError> {
        if !self.invariants.routes().iter().any(|r| r == route) {
            return Err(CrisisError::UnknownRoute(route.to_owned()));
        }
        if let Some(fee) = self.constant_fee()? {
            self.bank
                .send_from_account_to_module(sender, auth::FEE_COLLECTOR, &fee)?;
        }
        let outcome = self
            .invariants
            .run_one(ctx, route)
            .ok_or_else(|| CrisisError::UnknownRoute(route.to_owned()))?;
        if outcome.broken {
            tracing::error!(sender, route, height = ctx.height, "Invariant broken on request");
            return Err(InvariantViolation {
                route: outcome.route(),
                message: outcome.message,
            }
            .into());
        }
        Ok(outcome)
    }
}

impl EndPhaseModule for CrisisKeeper {
    fn end_phase(&self, ctx: &StepCtx, _req: &EndPhaseRequest) -> anyhow::Result<EndPhaseResult> {
        let period = self.config.inv_check_period;
        if period == 0 || ctx.height % period != 0 {
            return Ok(EndPhaseResult::default());
        }
        let checked = self.assert_invariants(ctx)?;
        Ok(EndPhaseResult {
            events: vec![
                Event::new("invariants_checked")
                    .attr("height", ctx.height)
                    .attr("count", checked),
            ],
            validator_updates: Vec::new(),
        })
    }
}
