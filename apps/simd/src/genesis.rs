use std::path::Path;

use anyhow::Context;
use bank::{Balance, BankGenesis, Coin};
use chainkit::GenesisState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staking::{Delegation, StakingGenesis, Validator};

/// On-disk genesis file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisDoc {
    pub chain_id: String,
    pub genesis_time: DateTime<Utc>,
    pub app_state: GenesisState,
}

impl GenesisDoc {
    /// # Errors
    /// Unreadable file or invalid JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read genesis file {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("invalid genesis file {}", path.display()))
    }

    /// # Errors
    /// If the file cannot be written.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write genesis file {}", path.display()))
    }

    /// Credits `coin` to `address` and drops the declared supply so it is
    /// recomputed on import.
    ///
    /// # Errors
    /// If the existing bank slice does not parse.
    pub fn add_balance(&mut self, address: &str, coin: Coin) -> anyhow::Result<()> {
        let mut bank: BankGenesis = slice(&self.app_state, bank::MODULE_NAME)?;
        credit(&mut bank, address.to_owned(), coin);
        bank.supply.clear();
        self.app_state
            .insert(bank::MODULE_NAME, serde_json::to_value(bank)?);
        Ok(())
    }

    /// Adds a self-bonded validator and funds the pool its tokens will sit
    /// in: bonded when they carry voting power, not-bonded otherwise.
    ///
    /// # Errors
    /// If the existing bank or staking slices do not parse.
    pub fn add_validator(&mut self, operator: &str, tokens: u64) -> anyhow::Result<()> {
        let mut staking: StakingGenesis = slice(&self.app_state, staking::MODULE_NAME)?;
        let mut bank: BankGenesis = slice(&self.app_state, bank::MODULE_NAME)?;

        staking.validators.push(Validator {
            operator: operator.to_owned(),
            cons_pub_key: format!("{operator}-consensus-key"),
            tokens,
            status: staking::BondStatus::Unbonded,
        });
        staking.delegations.push(Delegation {
            delegator: operator.to_owned(),
            validator: operator.to_owned(),
            amount: tokens,
        });

        let pool = if staking.params.power(tokens) > 0 {
            staking::BONDED_POOL
        } else {
            staking::NOT_BONDED_POOL
        };
        credit(
            &mut bank,
            auth::derive_module_address(pool),
            Coin::new(staking.params.bond_denom.clone(), tokens),
        );
        bank.supply.clear();

        self.app_state
            .insert(staking::MODULE_NAME, serde_json::to_value(staking)?);
        self.app_state
            .insert(bank::MODULE_NAME, serde_json::to_value(bank)?);
        Ok(())
    }
}

fn credit(bank: &mut BankGenesis, address: String, coin: Coin) {
    match bank.balances.iter_mut().find(|b| b.address == address) {
        Some(balance) => match balance.coins.iter_mut().find(|c| c.denom == coin.denom) {
            Some(held) => held.amount = held.amount.saturating_add(coin.amount),
            None => balance.coins.push(coin),
        },
        None => bank.balances.push(Balance {
            address,
            coins: vec![coin],
        }),
    }
}

fn slice<T: serde::de::DeserializeOwned + Default>(state: &GenesisState, module: &str) -> anyhow::Result<T> {
    match state.get(module) {
        Some(value) => serde_json::from_value(value.clone())
            .with_context(|| format!("invalid '{module}' genesis slice")),
        None => Ok(T::default()),
    }
}
