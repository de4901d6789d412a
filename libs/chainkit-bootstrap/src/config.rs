//! Layered node configuration.
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. YAML file (`--config`)
//! 3. environment, `SIMD__` prefix with `__` nesting (`SIMD__NODE__CHAIN_ID`)
//! 4. CLI overrides
//!
//! ```yaml
//! server:
//!   home_dir: ~/.simd
//! node:
//!   chain_id: simd-local
//!   block_interval_ms: 1000
//! logging:
//!   console_level: info
//!   file: logs/simd.log
//! orderings:
//!   begin: [consensus, staking, auth, bank, crisis]
//! modules:
//!   crisis:
//!     config:
//!       inv_check_period: 10
//! ```

use anyhow::{Context, Result};
use chainkit::PhaseOrderings;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::logging::LoggingConfig;
use crate::paths::resolve_home_dir;

pub const ENV_PREFIX: &str = "SIMD__";
pub const DEFAULT_HOME_SUBDIR: &str = ".simd";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub home_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: format!("~/{DEFAULT_HOME_SUBDIR}"),
        }
    }
}

/// State-machine driver settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub chain_id: String,
    /// Genesis file; relative paths resolve against `server.home_dir`.
    pub genesis_file: String,
    pub block_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_id: "simd-local".to_owned(),
            genesis_file: "genesis.json".to_owned(),
            block_interval_ms: 1000,
        }
    }
}

/// Whole application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub node: NodeConfig,
    pub logging: LoggingConfig,
    /// Phase orders; an empty list keeps the application's built-in order.
    pub orderings: PhaseOrderings,
    /// Per-module sections, shaped `{ config: { ... } }`.
    pub modules: BTreeMap<String, serde_json::Value>,
}

/// Command-line values that override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub home: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

impl AppConfig {
    /// Layers defaults, the optional YAML file and the environment.
    ///
    /// # Errors
    /// A missing or malformed file, or values of the wrong type.
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    /// [`Self::load_layered`] plus home directory normalization.
    ///
    /// # Errors
    /// As `load_layered`, or if the home directory cannot be resolved.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_layered(path)?;
        config.normalize_home_dir(false)?;
        Ok(config)
    }

    /// Applies CLI overrides; `-v`/`-vv`/`-vvv` raise console verbosity.
    ///
    /// # Errors
    /// If an overridden home directory cannot be resolved.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) -> Result<()> {
        if let Some(home) = &args.home {
            home.clone_into(&mut self.server.home_dir);
            self.normalize_home_dir(false)?;
        }
        match args.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.console_level),
            2 => "debug".clone_into(&mut self.logging.console_level),
            _ => "trace".clone_into(&mut self.logging.console_level),
        }
        Ok(())
    }

    /// Expands `~` and makes `server.home_dir` absolute, optionally creating it.
    ///
    /// # Errors
    /// If `HOME` is unset or the path is relative.
    pub fn normalize_home_dir(&mut self, create: bool) -> Result<PathBuf> {
        let resolved = resolve_home_dir(Some(&self.server.home_dir), DEFAULT_HOME_SUBDIR, create)?;
        self.server.home_dir = resolved.to_string_lossy().into_owned();
        Ok(resolved)
    }

    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.server.home_dir)
    }

    /// Absolute genesis file path.
    pub fn genesis_path(&self) -> PathBuf {
        let file = Path::new(&self.node.genesis_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.home_dir().join(file)
        }
    }

    /// Effective configuration as YAML.
    ///
    /// # Errors
    /// If serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to serialize configuration to YAML")
    }
}

/// Serves `modules.<name>` sections to module factories.
#[derive(Debug, Clone)]
pub struct AppConfigProvider {
    modules: BTreeMap<String, serde_json::Value>,
}

impl AppConfigProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            modules: config.modules.clone(),
        }
    }
}

impl chainkit::config::ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.modules.get(module_name)
    }
}
