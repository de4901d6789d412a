//! Balances and total supply. Publishes [`BankKeeperApi`] so that
//! dependent modules can move funds between accounts and module accounts.

pub mod api;
pub mod contract;
pub mod domain;
pub mod module;

pub use contract::client::BankKeeperApi;
pub use contract::error::BankError;
pub use contract::{Balance, Coin};
pub use domain::genesis::BankGenesis;
pub use module::{BankModule, MODULE_NAME, STORE_KEY};
