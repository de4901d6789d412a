use std::collections::BTreeMap;
use std::sync::Arc;

use auth::{AccountKeeperApi, Permission};
use chainkit::StoreHandle;
use parking_lot::Mutex;

use crate::contract::client::BankKeeperApi;
use crate::contract::error::BankError;
use crate::contract::{Balance, Coin};

const BALANCE_PREFIX: &[u8] = b"b/";
const SUPPLY_PREFIX: &[u8] = b"s/";

fn balance_key(address: &str, denom: &str) -> Vec<u8> {
    format!("b/{address}/{denom}").into_bytes()
}

fn supply_key(denom: &str) -> Vec<u8> {
    format!("s/{denom}").into_bytes()
}

/// Balance and supply storage over the module's `bank` namespace.
pub struct BankKeeper {
    store: StoreHandle,
    accounts: Arc<dyn AccountKeeperApi>,
    // Held across read-modify-write of balances.
    transfers: Mutex<()>,
}

impl BankKeeper {
    pub fn new(store: StoreHandle, accounts: Arc<dyn AccountKeeperApi>) -> Self {
        Self {
            store,
            accounts,
            transfers: Mutex::new(()),
        }
    }

    pub(crate) fn set_balance(&self, address: &str, denom: &str, amount: u64) -> Result<(), BankError> {
        let key = balance_key(address, denom);
        if amount == 0 {
            self.store.delete(&key);
        } else {
            self.store.set_json(&key, &amount)?;
        }
        Ok(())
    }

    pub(crate) fn set_supply(&self, denom: &str, amount: u64) -> Result<(), BankError> {
        let key = supply_key(denom);
        if amount == 0 {
            self.store.delete(&key);
        } else {
            self.store.set_json(&key, &amount)?;
        }
        Ok(())
    }

    /// Every coin held by `address`, ordered by denom.
    pub fn all_balances(&self, address: &str) -> Result<Vec<Coin>, BankError> {
        let prefix = format!("b/{address}/");
        Ok(self
            .store
            .iter_json::<u64>(prefix.as_bytes())?
            .into_iter()
            .map(|(k, amount)| Coin::new(String::from_utf8_lossy(&k[prefix.len()..]), amount))
            .collect())
    }

    /// Every non-empty balance, grouped by address in key order.
    pub fn balances(&self) -> Result<Vec<Balance>, BankError> {
        let mut grouped: BTreeMap<String, Vec<Coin>> = BTreeMap::new();
        for (k, amount) in self.store.iter_json::<u64>(BALANCE_PREFIX)? {
            let key = String::from_utf8_lossy(&k[BALANCE_PREFIX.len()..]).into_owned();
            if let Some((address, denom)) = key.rsplit_once('/') {
                grouped
                    .entry(address.to_owned())
                    .or_default()
                    .push(Coin::new(denom, amount));
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(address, coins)| Balance { address, coins })
            .collect())
    }

    /// Recorded supply of every denom, ordered by denom.
    pub fn supply(&self) -> Result<Vec<Coin>, BankError> {
        Ok(self
            .store
            .iter_json::<u64>(SUPPLY_PREFIX)?
            .into_iter()
            .map(|(k, amount)| {
                Coin::new(String::from_utf8_lossy(&k[SUPPLY_PREFIX.len()..]), amount)
            })
            .collect())
    }

    /// Sends several coins; either all move or none do.
    ///
    /// # Errors
    /// Invalid coins, insufficient funds for any of them, or storage failure.
    pub fn send_coins(&self, from: &str, to: &str, coins: &[Coin]) -> Result<(), BankError> {
        for coin in coins {
            coin.validate()?;
        }
        let _guard = self.transfers.lock();
        let mut debits: BTreeMap<&str, u64> = BTreeMap::new();
        for coin in coins {
            let total = debits.entry(coin.denom.as_str()).or_default();
            *total = total
                .checked_add(coin.amount)
                .ok_or_else(|| BankError::Overflow(coin.denom.clone()))?;
        }
        for (denom, required) in &debits {
            let available = self.balance(from, denom)?;
            if available < *required {
                return Err(BankError::InsufficientFunds {
                    address: from.to_owned(),
                    denom: (*denom).to_owned(),
                    available,
                    required: *required,
                });
            }
        }
        self.accounts.ensure_account(to)?;
        for (denom, amount) in debits {
            self.transfer_unlocked(from, to, denom, amount)?;
        }
        Ok(())
    }

    fn transfer_unlocked(&self, from: &str, to: &str, denom: &str, amount: u64) -> Result<(), BankError> {
        let available = self.balance(from, denom)?;
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| BankError::InsufficientFunds {
                address: from.to_owned(),
                denom: denom.to_owned(),
                available,
                required: amount,
            })?;
        self.set_balance(from, denom, remaining)?;
        let credited = self
            .balance(to, denom)?
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(denom.to_owned()))?;
        self.set_balance(to, denom, credited)?;
        tracing::trace!(from, to, denom, amount, "Transfer");
        Ok(())
    }

    fn transfer(&self, from: &str, to: &str, coin: &Coin) -> Result<(), BankError> {
        coin.validate()?;
        let _guard = self.transfers.lock();
        self.transfer_unlocked(from, to, &coin.denom, coin.amount)
    }
}

impl BankKeeperApi for BankKeeper {
    fn balance(&self, address: &str, denom: &str) -> Result<u64, BankError> {
        Ok(self
            .store
            .get_json(&balance_key(address, denom))?
            .unwrap_or(0))
    }

    fn module_balance(&self, module: &str, denom: &str) -> Result<u64, BankError> {
        self.balance(&self.accounts.module_address(module)?, denom)
    }

    fn total_supply(&self, denom: &str) -> Result<u64, BankError> {
        Ok(self.store.get_json(&supply_key(denom))?.unwrap_or(0))
    }

    fn send(&self, from: &str, to: &str, coin: &Coin) -> Result<(), BankError> {
        self.send_coins(from, to, std::slice::from_ref(coin))
    }

    fn send_from_account_to_module(&self, from: &str, module: &str, coin: &Coin) -> Result<(), BankError> {
        let to = self.accounts.module_account(module)?.address;
        self.transfer(from, &to, coin)
    }

    fn send_from_module_to_account(&self, module: &str, to: &str, coin: &Coin) -> Result<(), BankError> {
        let from = self.accounts.module_address(module)?;
        self.accounts.ensure_account(to)?;
        self.transfer(&from, to, coin)
    }

    fn send_between_modules(&self, from_module: &str, to_module: &str, coin: &Coin) -> Result<(), BankError> {
        let from = self.accounts.module_address(from_module)?;
        let to = self.accounts.module_account(to_module)?.address;
        self.transfer(&from, &to, coin)
    }

    fn burn(&self, module: &str, coin: &Coin) -> Result<(), BankError> {
        coin.validate()?;
        if !self.accounts.has_permission(module, Permission::Burner) {
            return Err(BankError::MissingPermission {
                module: module.to_owned(),
                permission: Permission::Burner.to_string(),
            });
        }
        let address = self.accounts.module_address(module)?;
        let _guard = self.transfers.lock();
        let available = self.balance(&address, &coin.denom)?;
        let remaining = available
            .checked_sub(coin.amount)
            .ok_or_else(|| BankError::InsufficientFunds {
                address: address.clone(),
                denom: coin.denom.clone(),
                available,
                required: coin.amount,
            })?;
        self.set_balance(&address, &coin.denom, remaining)?;
        let supply = self.total_supply(&coin.denom)?.saturating_sub(coin.amount);
        self.set_supply(&coin.denom, supply)?;
        tracing::info!(module, coin = %coin, "Burned coins");
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod test_support {
    use super::*;
    use auth::contract::{BaseAccount, ModuleAccount};
    use auth::AuthError;
    use chainkit::{MemKvStore, StoreAllocator};
    use std::collections::BTreeSet;

    /// Accounts stub: module address is `mod<name>`; `pool` burns, `fees` doesn't.
    #[derive(Default)]
    pub struct StubAccounts {
        pub created: Mutex<BTreeSet<String>>,
    }

    impl AccountKeeperApi for StubAccounts {
        fn account(&self, address: &str) -> Result<Option<BaseAccount>, AuthError> {
            Ok(self.created.lock().contains(address).then(|| BaseAccount {
                address: address.to_owned(),
                account_number: 0,
                sequence: 0,
            }))
        }

        fn ensure_account(&self, address: &str) -> Result<BaseAccount, AuthError> {
            auth::validate_address(address)?;
            self.created.lock().insert(address.to_owned());
            Ok(BaseAccount {
                address: address.to_owned(),
                account_number: 0,
                sequence: 0,
            })
        }

        fn module_account(&self, name: &str) -> Result<ModuleAccount, AuthError> {
            Ok(ModuleAccount {
                name: name.to_owned(),
                address: self.module_address(name)?,
                account_number: 0,
                permissions: Vec::new(),
            })
        }

        fn module_address(&self, name: &str) -> Result<String, AuthError> {
            match name {
                "pool" | "fees" => Ok(format!("mod{name}")),
                _ => Err(AuthError::UnknownModuleAccount(name.to_owned())),
            }
        }

        fn has_permission(&self, name: &str, permission: Permission) -> bool {
            name == "pool" && permission == Permission::Burner
        }
    }

    pub fn keeper() -> BankKeeper {
        let store = StoreAllocator::new(Arc::new(MemKvStore::new()))
            .allocate(&["bank"])
            .unwrap()
            .remove(0);
        BankKeeper::new(store, Arc::new(StubAccounts::default()))
    }

    pub fn fund(keeper: &BankKeeper, address: &str, coin: &Coin) {
        let current = keeper.balance(address, &coin.denom).unwrap();
        keeper
            .set_balance(address, &coin.denom, current + coin.amount)
            .unwrap();
        let supply = keeper.total_supply(&coin.denom).unwrap();
        keeper.set_supply(&coin.denom, supply + coin.amount).unwrap();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::test_support::{fund, keeper};
    use super::*;

    #[test]
    fn send_moves_funds_and_rejects_overdraft() {
        let k = keeper();
        fund(&k, "alice", &Coin::new("stake", 100));

        k.send("alice", "bob", &Coin::new("stake", 30)).unwrap();
        assert_eq!(k.balance("alice", "stake").unwrap(), 70);
        assert_eq!(k.balance("bob", "stake").unwrap(), 30);

        let err = k.send("alice", "bob", &Coin::new("stake", 71)).unwrap_err();
        assert!(matches!(
            err,
            BankError::InsufficientFunds { available: 70, required: 71, .. }
        ));
        assert_eq!(k.total_supply("stake").unwrap(), 100);
    }

    #[test]
    fn multi_coin_send_is_all_or_nothing() {
        let k = keeper();
        fund(&k, "alice", &Coin::new("stake", 10));
        fund(&k, "alice", &Coin::new("atom", 1));

        let err = k
            .send_coins("alice", "bob", &[Coin::new("stake", 5), Coin::new("atom", 2)])
            .unwrap_err();
        assert!(matches!(err, BankError::InsufficientFunds { ref denom, .. } if denom == "atom"));
        assert_eq!(k.balance("alice", "stake").unwrap(), 10);
        assert!(k.all_balances("bob").unwrap().is_empty());
    }

    #[test]
    fn zero_balances_are_not_stored() {
        let k = keeper();
        fund(&k, "alice", &Coin::new("stake", 5));
        k.send("alice", "bob", &Coin::new("stake", 5)).unwrap();
        assert!(k.all_balances("alice").unwrap().is_empty());
        assert_eq!(k.balances().unwrap().len(), 1);
    }

    #[test]
    fn module_transfers_and_burn() {
        let k = keeper();
        fund(&k, "alice", &Coin::new("stake", 50));

        k.send_from_account_to_module("alice", "pool", &Coin::new("stake", 20))
            .unwrap();
        k.send_between_modules("pool", "fees", &Coin::new("stake", 5))
            .unwrap();
        k.send_from_module_to_account("fees", "carol", &Coin::new("stake", 1))
            .unwrap();
        assert_eq!(k.module_balance("pool", "stake").unwrap(), 15);
        assert_eq!(k.module_balance("fees", "stake").unwrap(), 4);
        assert_eq!(k.balance("carol", "stake").unwrap(), 1);

        k.burn("pool", &Coin::new("stake", 15)).unwrap();
        assert_eq!(k.total_supply("stake").unwrap(), 35);
        assert!(matches!(
            k.burn("fees", &Coin::new("stake", 1)),
            Err(BankError::MissingPermission { .. })
        ));
        assert!(matches!(
            k.module_balance("unknown", "stake"),
            Err(BankError::Auth(_))
        ));
    }

    #[test]
    fn invalid_coins_are_rejected() {
        let k = keeper();
        for coin in [Coin::new("stake", 0), Coin::new("S", 1), Coin::new("1abc", 1)] {
            assert!(matches!(
                k.send("alice", "bob", &coin),
                Err(BankError::InvalidCoin(_))
            ));
        }
    }
}
