use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::error::StakingError;

pub mod error;

/// Module account holding tokens of bonded validators.
pub const BONDED_POOL: &str = "bonded_tokens_pool";
/// Module account holding tokens of validators outside the bonded set.
pub const NOT_BONDED_POOL: &str = "not_bonded_tokens_pool";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondStatus {
    #[default]
    Unbonded,
    Bonded,
}

impl BondStatus {
    pub fn pool(self) -> &'static str {
        match self {
            Self::Bonded => BONDED_POOL,
            Self::Unbonded => NOT_BONDED_POOL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    pub bond_denom: String,
    pub max_validators: u32,
    /// Heights of validator set history to keep; 0 keeps none.
    pub historical_entries: u32,
    /// Tokens per unit of consensus power.
    pub power_reduction: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            bond_denom: "stake".to_owned(),
            max_validators: 100,
            historical_entries: 10_000,
            power_reduction: 1_000_000,
        }
    }
}

impl Params {
    /// # Errors
    /// `StakingError::InvalidParams`.
    pub fn validate(&self) -> Result<(), StakingError> {
        if self.bond_denom.is_empty() {
            return Err(StakingError::InvalidParams("bond_denom is empty".into()));
        }
        if self.max_validators == 0 {
            return Err(StakingError::InvalidParams("max_validators must be positive".into()));
        }
        if self.power_reduction == 0 {
            return Err(StakingError::InvalidParams("power_reduction must be positive".into()));
        }
        Ok(())
    }

    pub fn power(&self, tokens: u64) -> i64 {
        i64::try_from(tokens.checked_div(self.power_reduction).unwrap_or(0)).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub operator: String,
    pub cons_pub_key: String,
    pub tokens: u64,
    #[serde(default)]
    pub status: BondStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: String,
    pub validator: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPower {
    pub operator: String,
    pub cons_pub_key: String,
    pub power: i64,
}

/// Bonded set as it stood when a step began.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalInfo {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub valset: Vec<ValidatorPower>,
}
