use auth::AuthError;
use bank::BankError;
use chainkit::store::StoreError;

/// Errors for the staking module
#[derive(Debug, thiserror::Error)]
pub enum StakingError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("invalid validator: {0}")]
    InvalidValidator(String),

    #[error("unknown validator: {0}")]
    UnknownValidator(String),

    #[error("validator already exists: {0}")]
    ValidatorExists(String),

    #[error("consensus key already in use: {0}")]
    DuplicatePubKey(String),

    #[error("wrong denom: expected {expected}, got {got}")]
    WrongDenom { expected: String, got: String },

    #[error("{delegator} has {available} delegated to {validator}, cannot undelegate {required}")]
    InsufficientDelegation {
        delegator: String,
        validator: String,
        available: u64,
        required: u64,
    },

    #[error("pool {pool} holds {actual}, expected {expected}")]
    PoolMismatch {
        pool: String,
        expected: u64,
        actual: u64,
    },

    #[error("token amount overflow")]
    Overflow,

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
