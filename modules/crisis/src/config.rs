use serde::Deserialize;

/// `modules.crisis.config`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrisisConfig {
    /// Check all invariants every this many heights; 0 disables.
    pub inv_check_period: u64,
    pub skip_genesis_invariants: bool,
}
