//! Accounts module: account numbers, sequences and permissioned module
//! accounts. Publishes [`AccountKeeperApi`] to dependent modules.

pub mod api;
pub mod contract;
pub mod domain;
pub mod module;

pub use contract::client::AccountKeeperApi;
pub use contract::error::AuthError;
pub use contract::{FEE_COLLECTOR, BaseAccount, ModuleAccount, Permission, validate_address};
pub use module::{AuthModule, MODULE_NAME, STORE_KEY};
pub use domain::keeper::derive_module_address;
