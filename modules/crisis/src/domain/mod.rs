pub mod genesis;
pub mod keeper;
