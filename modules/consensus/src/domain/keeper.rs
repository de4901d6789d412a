use chainkit::StoreHandle;

use crate::contract::BlockParams;
use crate::contract::error::ConsensusError;

const PARAMS_KEY: &[u8] = b"params";
const AUTHORITY_KEY: &[u8] = b"authority";

pub struct ConsensusKeeper {
    store: StoreHandle,
}

impl ConsensusKeeper {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub fn params(&self) -> Result<BlockParams, ConsensusError> {
        Ok(self.store.get_json(PARAMS_KEY)?.unwrap_or_default())
    }

    pub fn authority(&self) -> Result<String, ConsensusError> {
        Ok(self.store.get_json(AUTHORITY_KEY)?.unwrap_or_default())
    }

    pub(crate) fn set_authority(&self, authority: &str) -> Result<(), ConsensusError> {
        self.store.set_json(AUTHORITY_KEY, authority)?;
        Ok(())
    }

    pub(crate) fn set_params(&self, params: &BlockParams) -> Result<(), ConsensusError> {
        params.validate()?;
        self.store.set_json(PARAMS_KEY, params)?;
        Ok(())
    }

    /// # Errors
    /// `Unauthorized` unless `sender` is the authority; invalid params.
    pub fn update_params(&self, sender: &str, params: &BlockParams) -> Result<(), ConsensusError> {
        let authority = self.authority()?;
        if sender != authority {
            return Err(ConsensusError::Unauthorized {
                expected: authority,
                got: sender.to_owned(),
            });
        }
        self.set_params(params)?;
        tracing::info!(
            max_bytes = params.max_bytes,
            max_gas = params.max_gas,
            "Block params updated"
        );
        Ok(())
    }
}
