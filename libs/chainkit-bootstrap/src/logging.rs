//! Console and file logging for the node.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Console filter directive; `RUST_LOG` takes precedence when set.
    pub console_level: String,
    /// JSON lines on the console instead of the human format.
    pub json: bool,
    /// Log file, relative to the home directory. Always JSON.
    pub file: Option<String>,
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "info".to_owned(),
            json: false,
            file: None,
            file_level: "debug".to_owned(),
        }
    }
}

impl LoggingConfig {
    fn console_filter(&self) -> anyhow::Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.console_level)
                .with_context(|| format!("invalid console_level '{}'", self.console_level)),
        }
    }

    fn file_filter(&self) -> anyhow::Result<EnvFilter> {
        EnvFilter::try_new(&self.file_level)
            .with_context(|| format!("invalid file_level '{}'", self.file_level))
    }

    /// Absolute log file path, if file logging is enabled.
    pub fn file_path(&self, home_dir: &Path) -> Option<std::path::PathBuf> {
        self.file.as_ref().map(|f| {
            let p = Path::new(f);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                home_dir.join(p)
            }
        })
    }
}

/// Installs the global subscriber.
///
/// Returns the file writer guard when file logging is on; dropping it
/// flushes and stops the background writer.
///
/// # Errors
/// Bad filter directives, an uncreatable log directory, or a subscriber
/// already installed.
pub fn init_logging(config: &LoggingConfig, home_dir: &Path) -> anyhow::Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let console: BoxedLayer = if config.json {
        console.json().with_filter(config.console_filter()?).boxed()
    } else {
        console.with_filter(config.console_filter()?).boxed()
    };
    layers.push(console);

    let mut guard = None;
    if let Some(path) = config.file_path(home_dir) {
        let dir = path.parent().unwrap_or(home_dir);
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let file_name = path
            .file_name()
            .with_context(|| format!("log file path has no file name: {}", path.display()))?;

        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(config.file_filter()?)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}
