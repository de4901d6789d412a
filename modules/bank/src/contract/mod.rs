use serde::{Deserialize, Serialize};

use crate::contract::error::BankError;

pub mod client;
pub mod error;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Denoms are 2 to 64 lowercase ASCII letters or digits, starting with
    /// a letter. Amounts must be positive.
    ///
    /// # Errors
    /// `BankError::InvalidCoin`.
    pub fn validate(&self) -> Result<(), BankError> {
        let d = self.denom.as_bytes();
        let denom_ok = (2..=64).contains(&d.len())
            && d[0].is_ascii_lowercase()
            && d.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        if !denom_ok {
            return Err(BankError::InvalidCoin(format!("bad denom '{}'", self.denom)));
        }
        if self.amount == 0 {
            return Err(BankError::InvalidCoin(format!("zero amount of {}", self.denom)));
        }
        Ok(())
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Coins held by one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub coins: Vec<Coin>,
}
