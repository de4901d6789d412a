use crate::contract::error::AuthError;
use crate::contract::{BaseAccount, ModuleAccount, Permission};

/// Account access for modules that declare `auth` as a dependency.
pub trait AccountKeeperApi: Send + Sync {
    /// Account by address, if it exists.
    fn account(&self, address: &str) -> Result<Option<BaseAccount>, AuthError>;

    /// Account by address, created with the next account number if missing.
    fn ensure_account(&self, address: &str) -> Result<BaseAccount, AuthError>;

    /// Module account by name; only names in the permission table exist.
    fn module_account(&self, name: &str) -> Result<ModuleAccount, AuthError>;

    /// Address of a module account.
    fn module_address(&self, name: &str) -> Result<String, AuthError>;

    /// Whether the named module account holds `permission`.
    fn has_permission(&self, name: &str, permission: Permission) -> bool;
}
