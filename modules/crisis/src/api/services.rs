use std::sync::Arc;

use bank::Coin;
use chainkit::{ModuleRouter, ServiceModule, StepCtx};
use serde::{Deserialize, Serialize};

use crate::domain::keeper::CrisisKeeper;

#[derive(Debug, Deserialize)]
pub struct MsgVerifyInvariant {
    pub sender: String,
    /// `<module>/<name>`
    pub route: String,
}

#[derive(Debug, Serialize)]
pub struct MsgVerifyInvariantResponse {
    pub route: String,
    pub message: String,
}

pub struct CrisisServices {
    keeper: Arc<CrisisKeeper>,
}

impl CrisisServices {
    pub fn new(keeper: Arc<CrisisKeeper>) -> Self {
        Self { keeper }
    }
}

impl ServiceModule for CrisisServices {
    fn register_services(&self, router: &mut ModuleRouter<'_>) -> anyhow::Result<()> {
        let k = Arc::clone(&self.keeper);
        router.msg(
            "verify_invariant",
            move |ctx: &StepCtx, m: MsgVerifyInvariant| -> anyhow::Result<MsgVerifyInvariantResponse> {
                let outcome = k.verify_invariant(ctx, &m.sender, &m.route)?;
                Ok(MsgVerifyInvariantResponse {
                    route: outcome.route(),
                    message: outcome.message,
                })
            },
        )?;

        let k = Arc::clone(&self.keeper);
        router.query("constant_fee", move |_: serde_json::Value| -> anyhow::Result<Option<Coin>> {
            Ok(k.constant_fee()?)
        })?;
        Ok(())
    }
}
