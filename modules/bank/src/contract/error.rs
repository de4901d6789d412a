use auth::AuthError;
use chainkit::store::StoreError;

/// Errors for the bank module
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("insufficient funds: {address} has {available}{denom}, needs {required}{denom}")]
    InsufficientFunds {
        address: String,
        denom: String,
        available: u64,
        required: u64,
    },

    #[error("invalid coin: {0}")]
    InvalidCoin(String),

    #[error("amount overflow for denom {0}")]
    Overflow(String),

    #[error("supply mismatch for {denom}: declared {declared}, balances sum to {actual}")]
    SupplyMismatch {
        denom: String,
        declared: u64,
        actual: u64,
    },

    #[error("duplicate balance entry for {0}")]
    DuplicateBalance(String),

    #[error("module account '{module}' lacks the {permission} permission")]
    MissingPermission { module: String, permission: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
