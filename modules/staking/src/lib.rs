//! Validators, delegations and the bonded validator set.
//!
//! The bonded set is the top `max_validators` validators by power. Its
//! changes are reported as validator updates at the end of every step, and
//! a snapshot of it is kept per height for `historical_entries` heights.

pub mod api;
pub mod contract;
pub mod domain;
pub mod module;

pub use contract::error::StakingError;
pub use contract::{
    BONDED_POOL, BondStatus, Delegation, HistoricalInfo, NOT_BONDED_POOL, Params, Validator,
    ValidatorPower,
};
pub use domain::genesis::StakingGenesis;
pub use module::{MODULE_NAME, STORE_KEY, StakingModule};
