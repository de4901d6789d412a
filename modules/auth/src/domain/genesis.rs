use std::collections::HashSet;

use chainkit::{StepCtx, TypedGenesis, ValidatorUpdate};
use serde::{Deserialize, Serialize};

use crate::contract::error::AuthError;
use crate::contract::{BaseAccount, validate_address};
use crate::domain::keeper::AccountKeeper;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthGenesis {
    pub accounts: Vec<BaseAccount>,
}

impl AuthGenesis {
    /// # Errors
    /// Invalid addresses, or a repeated address or account number.
    pub fn validate(&self) -> Result<(), AuthError> {
        let mut addresses = HashSet::new();
        let mut numbers = HashSet::new();
        for account in &self.accounts {
            validate_address(&account.address)?;
            if !addresses.insert(account.address.as_str()) {
                return Err(AuthError::DuplicateAccount(account.address.clone()));
            }
            if !numbers.insert(account.account_number) {
                return Err(AuthError::DuplicateAccountNumber {
                    number: account.account_number,
                });
            }
        }
        Ok(())
    }
}

impl TypedGenesis for AccountKeeper {
    type Genesis = AuthGenesis;

    fn validate(&self, genesis: &AuthGenesis) -> anyhow::Result<()> {
        Ok(genesis.validate()?)
    }

    fn init(&self, _ctx: &StepCtx, genesis: AuthGenesis) -> anyhow::Result<Vec<ValidatorUpdate>> {
        for account in &genesis.accounts {
            self.set_account(account)?;
        }
        let next = genesis
            .accounts
            .iter()
            .map(|a| a.account_number + 1)
            .max()
            .unwrap_or(0);
        self.set_next_number(next)?;
        self.init_module_accounts()?;

        tracing::info!(
            accounts = genesis.accounts.len(),
            module_accounts = self.permissions().len(),
            "Accounts loaded from genesis"
        );
        Ok(Vec::new())
    }

    fn export(&self, _ctx: &StepCtx) -> anyhow::Result<AuthGenesis> {
        Ok(AuthGenesis {
            accounts: self.accounts()?,
        })
    }
}
