use chainkit::store::StoreError;

/// Errors for the accounts module
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown module account: {0}")]
    UnknownModuleAccount(String),

    #[error("duplicate account in genesis: {0}")]
    DuplicateAccount(String),

    #[error("duplicate account number {number} in genesis")]
    DuplicateAccountNumber { number: u64 },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
