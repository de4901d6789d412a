use std::collections::BTreeMap;

use chainkit::StoreHandle;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::contract::client::AccountKeeperApi;
use crate::contract::error::AuthError;
use crate::contract::{BaseAccount, ModuleAccount, Permission, validate_address};

const ACCOUNT_PREFIX: &[u8] = b"a/";
const MODULE_ACCOUNT_PREFIX: &[u8] = b"m/";
const NEXT_NUMBER_KEY: &[u8] = b"next_number";

fn key(prefix: &[u8], id: &str) -> Vec<u8> {
    let mut k = prefix.to_vec();
    k.extend_from_slice(id.as_bytes());
    k
}

/// Deterministic address of a module account: first 20 bytes of
/// `sha256("module:" + name)`, hex encoded.
pub fn derive_module_address(name: &str) -> String {
    let digest = Sha256::digest(format!("module:{name}").as_bytes());
    hex::encode(&digest[..20])
}

/// Account storage over the module's `acc` namespace.
pub struct AccountKeeper {
    store: StoreHandle,
    permissions: BTreeMap<String, Vec<Permission>>,
    // Serializes account number allocation.
    numbers: Mutex<()>,
}

impl AccountKeeper {
    pub fn new(store: StoreHandle, permissions: BTreeMap<String, Vec<Permission>>) -> Self {
        Self {
            store,
            permissions,
            numbers: Mutex::new(()),
        }
    }

    pub fn permissions(&self) -> &BTreeMap<String, Vec<Permission>> {
        &self.permissions
    }

    fn next_number(&self) -> Result<u64, AuthError> {
        Ok(self.store.get_json(NEXT_NUMBER_KEY)?.unwrap_or(0))
    }

    pub(crate) fn set_account(&self, account: &BaseAccount) -> Result<(), AuthError> {
        self.store
            .set_json(&key(ACCOUNT_PREFIX, &account.address), account)?;
        Ok(())
    }

    pub(crate) fn set_next_number(&self, number: u64) -> Result<(), AuthError> {
        self.store.set_json(NEXT_NUMBER_KEY, &number)?;
        Ok(())
    }

    /// All accounts ordered by account number.
    pub fn accounts(&self) -> Result<Vec<BaseAccount>, AuthError> {
        let mut accounts: Vec<BaseAccount> = self
            .store
            .iter_json(ACCOUNT_PREFIX)?
            .into_iter()
            .map(|(_, a)| a)
            .collect();
        accounts.sort_by_key(|a| a.account_number);
        Ok(accounts)
    }

    /// Creates every module account named in the permission table.
    pub(crate) fn init_module_accounts(&self) -> Result<(), AuthError> {
        for name in self.permissions.keys() {
            self.module_account(name)?;
        }
        Ok(())
    }
}

impl AccountKeeperApi for AccountKeeper {
    fn account(&self, address: &str) -> Result<Option<BaseAccount>, AuthError> {
        Ok(self.store.get_json(&key(ACCOUNT_PREFIX, address))?)
    }

    fn ensure_account(&self, address: &str) -> Result<BaseAccount, AuthError> {
        validate_address(address)?;
        let _guard = self.numbers.lock();
        if let Some(existing) = self.account(address)? {
            return Ok(existing);
        }
        let account = BaseAccount {
            address: address.to_owned(),
            account_number: self.next_number()?,
            sequence: 0,
        };
        self.set_account(&account)?;
        self.set_next_number(account.account_number + 1)?;
        tracing::debug!(
            address,
            account_number = account.account_number,
            "Account created"
        );
        Ok(account)
    }

    fn module_account(&self, name: &str) -> Result<ModuleAccount, AuthError> {
        let permissions = self
            .permissions
            .get(name)
            .ok_or_else(|| AuthError::UnknownModuleAccount(name.to_owned()))?;
        if let Some(existing) = self.store.get_json(&key(MODULE_ACCOUNT_PREFIX, name))? {
            return Ok(existing);
        }
        let base = self.ensure_account(&derive_module_address(name))?;
        let account = ModuleAccount {
            name: name.to_owned(),
            address: base.address,
            account_number: base.account_number,
            permissions: permissions.clone(),
        };
        self.store
            .set_json(&key(MODULE_ACCOUNT_PREFIX, name), &account)?;
        Ok(account)
    }

    fn module_address(&self, name: &str) -> Result<String, AuthError> {
        if self.permissions.contains_key(name) {
            Ok(derive_module_address(name))
        } else {
            Err(AuthError::UnknownModuleAccount(name.to_owned()))
        }
    }

    fn has_permission(&self, name: &str, permission: Permission) -> bool {
        self.permissions
            .get(name)
            .is_some_and(|perms| perms.contains(&permission))
    }
}
