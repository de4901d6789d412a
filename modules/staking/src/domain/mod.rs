pub mod genesis;
pub mod invariants;
pub mod keeper;
pub mod phases;
