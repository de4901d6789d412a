//! Typed access to per-module configuration sections.
//!
//! Modules' sections live under `modules.<name>` in the application config,
//! shaped as `{ config: { ... } }`. Two loaders:
//!
//! - [`module_config_or_default`]: missing module, non-object entry or missing
//!   `config` all yield `T::default()`; only a present but invalid section
//!   is an error.
//! - [`module_config_required`]: every one of those cases is an error.

use serde::de::DeserializeOwned;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("module '{module}' not found")]
    ModuleNotFound { module: String },
    #[error("module '{module}' config must be an object")]
    InvalidModuleStructure { module: String },
    #[error("missing 'config' section in module '{module}'")]
    MissingConfigSection { module: String },
    #[error("invalid config for module '{module}': {source}")]
    InvalidConfig {
        module: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of raw per-module sections.
pub trait ConfigProvider: Send + Sync {
    /// Raw `modules.<name>` entry, if any.
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// Provider backed by a plain map; used by tests and embedders that build
/// configuration in code.
#[derive(Debug, Clone, Default)]
pub struct MapConfigProvider {
    modules: HashMap<String, serde_json::Value>,
}

impl MapConfigProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `modules.<module>.config`.
    #[must_use]
    pub fn with_config(mut self, module: &str, config: serde_json::Value) -> Self {
        self.modules
            .insert(module.to_owned(), serde_json::json!({ "config": config }));
        self
    }

    /// Sets the raw `modules.<module>` entry.
    #[must_use]
    pub fn with_raw(mut self, module: &str, raw: serde_json::Value) -> Self {
        self.modules.insert(module.to_owned(), raw);
        self
    }
}

impl ConfigProvider for MapConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.modules.get(module_name)
    }
}

fn config_section<'a>(
    provider: &'a dyn ConfigProvider,
    module_name: &str,
) -> Result<&'a serde_json::Value, ConfigError> {
    let raw = provider
        .get_module_config(module_name)
        .ok_or_else(|| ConfigError::ModuleNotFound {
            module: module_name.to_owned(),
        })?;
    let obj = raw
        .as_object()
        .ok_or_else(|| ConfigError::InvalidModuleStructure {
            module: module_name.to_owned(),
        })?;
    obj.get("config")
        .ok_or_else(|| ConfigError::MissingConfigSection {
            module: module_name.to_owned(),
        })
}

fn parse<T: DeserializeOwned>(
    module_name: &str,
    section: &serde_json::Value,
) -> Result<T, ConfigError> {
    T::deserialize(section).map_err(|source| ConfigError::InvalidConfig {
        module: module_name.to_owned(),
        source,
    })
}

/// Lenient loader: falls back to `T::default()` unless a section is present
/// and invalid.
///
/// # Errors
/// `ConfigError::InvalidConfig` if the section exists but does not decode.
pub fn module_config_or_default<T: DeserializeOwned + Default>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    match config_section(provider, module_name) {
        Ok(section) => parse(module_name, section),
        Err(_) => Ok(T::default()),
    }
}

/// Strict loader: the section must exist and decode.
///
/// # Errors
/// Any `ConfigError` variant.
pub fn module_config_required<T: DeserializeOwned>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    parse(module_name, config_section(provider, module_name)?)
}
