//! Invariant enforcement: checks every registered invariant at genesis and
//! periodically at the end of a step, halting on the first violation, and
//! lets anyone pay a fee to check one invariant on demand.

pub mod api;
pub mod config;
pub mod contract;
pub mod domain;
pub mod module;

pub use config::CrisisConfig;
pub use contract::error::CrisisError;
pub use domain::genesis::CrisisGenesis;
pub use module::{CrisisModule, MODULE_NAME, STORE_KEY};
