//! `simd`: a simulated chain node built from the chainkit modules.

pub mod app;
pub mod driver;
pub mod genesis;

pub use app::{SimApp, StepOutcome, default_orderings};
pub use driver::{DriverOptions, run_blocks};
pub use genesis::GenesisDoc;
