use serde::{Deserialize, Serialize};

use crate::contract::error::ConsensusError;

pub mod error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockParams {
    pub max_bytes: i64,
    /// -1 means unlimited.
    pub max_gas: i64,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            max_bytes: 22_020_096,
            max_gas: -1,
        }
    }
}

impl BlockParams {
    /// # Errors
    /// `ConsensusError::InvalidParams`.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.max_bytes <= 0 {
            return Err(ConsensusError::InvalidParams(format!(
                "max_bytes must be positive, got {}",
                self.max_bytes
            )));
        }
        if self.max_gas < -1 {
            return Err(ConsensusError::InvalidParams(format!(
                "max_gas must be -1 or more, got {}",
                self.max_gas
            )));
        }
        Ok(())
    }
}
