//! Genesis state container and the codec that decodes per-module slices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::GenesisDecodeError;

/// Module name → that module's serialized initial state.
///
/// A `BTreeMap` so that re-encoding is byte-for-byte stable across replicas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenesisState(BTreeMap<String, serde_json::Value>);

impl GenesisState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: impl Into<String>, slice: serde_json::Value) {
        self.0.insert(module.into(), slice);
    }

    #[must_use]
    pub fn with(mut self, module: impl Into<String>, slice: serde_json::Value) -> Self {
        self.insert(module, slice);
        self
    }

    pub fn get(&self, module: &str) -> Option<&serde_json::Value> {
        self.0.get(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decodes the raw application state handed over by the driver and the
/// per-module slices inside it.
pub trait GenesisCodec: Send + Sync {
    /// Splits the driver's app-state bytes into per-module slices.
    ///
    /// # Errors
    /// `GenesisDecodeError` (with an empty module name) if the bytes are not
    /// a module map.
    fn decode_state(&self, bytes: &[u8]) -> Result<GenesisState, GenesisDecodeError>;

    /// # Errors
    /// `GenesisDecodeError` if the state cannot be serialized.
    fn encode_state(&self, state: &GenesisState) -> Result<Vec<u8>, GenesisDecodeError>;

    /// Normalizes one module's slice before it is deserialized into the
    /// module's typed genesis. `None` means the state carried no slice.
    ///
    /// # Errors
    /// `GenesisDecodeError` if the slice has the wrong shape.
    fn decode_slice(
        &self,
        module: &str,
        slice: Option<&serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, GenesisDecodeError>;
}

/// JSON codec: slices must be JSON objects; `null` is treated as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl GenesisCodec for JsonCodec {
    fn decode_state(&self, bytes: &[u8]) -> Result<GenesisState, GenesisDecodeError> {
        serde_json::from_slice(bytes).map_err(|e| GenesisDecodeError {
            module: String::new(),
            source: e.into(),
        })
    }

    fn encode_state(&self, state: &GenesisState) -> Result<Vec<u8>, GenesisDecodeError> {
        serde_json::to_vec_pretty(state).map_err(|e| GenesisDecodeError {
            module: String::new(),
            source: e.into(),
        })
    }

    fn decode_slice(
        &self,
        module: &str,
        slice: Option<&serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, GenesisDecodeError> {
        match slice {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v @ serde_json::Value::Object(_)) => Ok(Some(v.clone())),
            Some(other) => Err(GenesisDecodeError {
                module: module.to_owned(),
                source: anyhow::anyhow!(
                    "expected a JSON object, found {}",
                    json_kind(other)
                ),
            }),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
