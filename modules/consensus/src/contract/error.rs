use chainkit::store::StoreError;

/// Errors for the consensus params module
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("{got} is not the params authority (expected {expected})")]
    Unauthorized { expected: String, got: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
