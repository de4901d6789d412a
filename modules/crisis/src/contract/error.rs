use bank::BankError;
use chainkit::InvariantViolation;
use chainkit::store::StoreError;

/// Errors for the crisis module
#[derive(Debug, thiserror::Error)]
pub enum CrisisError {
    #[error("no invariant registered under route '{0}'")]
    UnknownRoute(String),

    #[error(transparent)]
    Violation(#[from] InvariantViolation),

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
