//! Consensus block parameters, changeable only by a configured authority.

pub mod api;
pub mod contract;
pub mod domain;
pub mod module;

pub use contract::BlockParams;
pub use contract::error::ConsensusError;
pub use domain::genesis::ConsensusGenesis;
pub use module::{ConsensusModule, MODULE_NAME, STORE_KEY};
