use crate::contract::Coin;
use crate::contract::error::BankError;

/// Fund movements for modules that declare `bank` as a dependency.
///
/// Module accounts are addressed by module account name and resolved
/// through the accounts module.
pub trait BankKeeperApi: Send + Sync {
    fn balance(&self, address: &str, denom: &str) -> Result<u64, BankError>;

    fn module_balance(&self, module: &str, denom: &str) -> Result<u64, BankError>;

    fn total_supply(&self, denom: &str) -> Result<u64, BankError>;

    fn send(&self, from: &str, to: &str, coin: &Coin) -> Result<(), BankError>;

    fn send_from_account_to_module(
        &self,
        from: &str,
        module: &str,
        coin: &Coin,
    ) -> Result<(), BankError>;

    fn send_from_module_to_account(
        &self,
        module: &str,
        to: &str,
        coin: &Coin,
    ) -> Result<(), BankError>;

    fn send_between_modules(
        &self,
        from_module: &str,
        to_module: &str,
        coin: &Coin,
    ) -> Result<(), BankError>;

    /// Destroys coins held by a module account with the burner permission.
    fn burn(&self, module: &str, coin: &Coin) -> Result<(), BankError>;
}
