use std::sync::Arc;

use chainkit::{ModuleRouter, ServiceModule};
use serde::Deserialize;

use crate::contract::client::AccountKeeperApi;
use crate::contract::{BaseAccount, ModuleAccount};
use crate::domain::keeper::AccountKeeper;

#[derive(Debug, Deserialize)]
struct AccountQuery {
    address: String,
}

#[derive(Debug, Deserialize)]
struct ModuleAccountQuery {
    name: String,
}

/// Query routes of the accounts module.
pub struct AuthServices {
    keeper: Arc<AccountKeeper>,
}

impl AuthServices {
    pub fn new(keeper: Arc<AccountKeeper>) -> Self {
        Self { keeper }
    }
}

impl ServiceModule for AuthServices {
    fn register_services(&self, router: &mut ModuleRouter<'_>) -> anyhow::Result<()> {
        let k = Arc::clone(&self.keeper);
        router.query("account", move |q: AccountQuery| -> anyhow::Result<Option<BaseAccount>> {
            Ok(k.account(&q.address)?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query("accounts", move |_: serde_json::Value| -> anyhow::Result<Vec<BaseAccount>> {
            Ok(k.accounts()?)
        })?;

        let k = Arc::clone(&self.keeper);
        router.query(
            "module_account",
            move |q: ModuleAccountQuery| -> anyhow::Result<ModuleAccount> {
                Ok(k.module_account(&q.name)?)
            },
        )?;
        Ok(())
    }
}
