use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chainkit_bootstrap::{AppConfig, CliArgs, cancel_on_shutdown, init_logging};
use chrono::Utc;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use simd::{DriverOptions, GenesisDoc, SimApp, run_blocks};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// simd - single-node simulation of a modular state machine
#[derive(Parser)]
#[command(name = "simd")]
#[command(about = "simd - single-node simulation of a modular state machine")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node home directory (overrides config)
    #[arg(long)]
    home: Option<String>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default genesis file into the home directory
    Init {
        /// Add a self-bonded validator with this operator address
        #[arg(long)]
        validator: Option<String>,
        /// Tokens bonded by --validator
        #[arg(long, default_value_t = 100_000_000)]
        stake: u64,
        /// Overwrite an existing genesis file
        #[arg(long)]
        force: bool,
    },
    /// Apply genesis and produce blocks (default)
    Start {
        /// Stop after this many blocks
        #[arg(long)]
        blocks: Option<u64>,
    },
    /// Validate configuration and genesis, then exit
    Check,
    /// Apply genesis, run some blocks and print the resulting state as genesis
    Export {
        #[arg(long, default_value_t = 0)]
        blocks: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().into_owned()),
        home: cli.home.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // 1) defaults -> 2) YAML -> 3) env (SIMD__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args)?;

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_yaml()?);
        return Ok(());
    }

    let home = config.normalize_home_dir(true)?;
    let _log_guard = init_logging(&config.logging, &home)?;

    match cli.command.unwrap_or(Commands::Start { blocks: None }) {
        Commands::Init {
            validator,
            stake,
            force,
        } => init_genesis_file(&config, validator.as_deref(), stake, force),
        Commands::Start { blocks } => start(&config, blocks).await,
        Commands::Check => check(&config),
        Commands::Export { blocks } => export(&config, blocks).await,
    }
}

fn init_genesis_file(config: &AppConfig, validator: Option<&str>, stake: u64, force: bool) -> Result<()> {
    let path = config.genesis_path();
    if path.exists() && !force {
        anyhow::bail!("genesis file already exists: {} (use --force)", path.display());
    }

    let app = SimApp::new(config)?;
    let mut doc = app.default_genesis_doc(Utc::now())?;
    if let Some(operator) = validator {
        doc.add_validator(operator, stake)?;
    }
    app.validate_genesis(&doc)?;
    doc.save(&path)?;

    tracing::info!(path = %path.display(), chain_id = %doc.chain_id, "Genesis written");
    println!("{}", path.display());
    Ok(())
}

fn load_app(config: &AppConfig) -> Result<(SimApp, GenesisDoc)> {
    let app = SimApp::new(config)?;
    let doc = GenesisDoc::load(&config.genesis_path())?;
    app.validate_genesis(&doc)?;
    Ok((app, doc))
}

async fn start(config: &AppConfig, blocks: Option<u64>) -> Result<()> {
    tracing::info!(chain_id = %config.node.chain_id, "simd starting");
    let (app, doc) = load_app(config)?;
    app.init_chain(&doc)?;

    let cancel = CancellationToken::new();
    let signals = cancel_on_shutdown(cancel.clone());
    let opts = DriverOptions {
        blocks,
        interval: Duration::from_millis(config.node.block_interval_ms),
    };
    let result = run_blocks(&app, opts, cancel.clone()).await;
    cancel.cancel();
    signals.abort();

    let height = result?;
    tracing::info!(height, app_hash = %app.app_hash(), "simd stopped");
    Ok(())
}

fn check(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let app = SimApp::new(config)?;
    let path = config.genesis_path();
    if path.exists() {
        let doc = GenesisDoc::load(&path)?;
        app.validate_genesis(&doc)?;
        println!("Genesis {} is valid", path.display());
    }
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn export(config: &AppConfig, blocks: u64) -> Result<()> {
    let (app, doc) = load_app(config)?;
    app.init_chain(&doc)?;
    if blocks > 0 {
        let opts = DriverOptions {
            blocks: Some(blocks),
            interval: Duration::from_millis(1),
        };
        run_blocks(&app, opts, CancellationToken::new()).await?;
    }
    println!("{}", serde_json::to_string_pretty(&app.export()?)?);
    Ok(())
}
