use serde::{Deserialize, Serialize};

pub mod client;
pub mod error;

/// Module account collecting fees.
pub const FEE_COLLECTOR: &str = "fee_collector";

/// Module account permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Minter,
    Burner,
    Staking,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Minter => "minter",
            Self::Burner => "burner",
            Self::Staking => "staking",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: String,
    pub account_number: u64,
    #[serde(default)]
    pub sequence: u64,
}

/// An account owned by a module rather than a key holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAccount {
    pub name: String,
    pub address: String,
    pub account_number: u64,
    pub permissions: Vec<Permission>,
}

/// Addresses are 1 to 64 ASCII alphanumeric characters.
///
/// # Errors
/// `AuthError::InvalidAddress` otherwise.
pub fn validate_address(address: &str) -> Result<(), error::AuthError> {
    let ok = !address.is_empty()
        && address.len() <= 64
        && address.bytes().all(|b| b.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(error::AuthError::InvalidAddress(address.to_owned()))
    }
}
