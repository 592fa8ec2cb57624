//! CLI parser and command dispatch.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use harvest_browser::{BrowserDriver, BrowserEngine};
use harvest_core::{EngineState, HarvestConfig, RecentLogs};
use harvest_scanner::Engine;
use harvest_store::DedupStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Collect business contact emails from a map directory")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML, or JSON by extension)
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one harvest; Ctrl-C stops it after the current step
    Run {
        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Show the persisted results
    Status {
        /// Print only the record count
        #[arg(long)]
        count: bool,
    },

    /// Delete the persisted results
    Clear,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Per-run settings that take precedence over the config file.
#[derive(clap::Args, Debug, Default)]
struct RunOverrides {
    /// Search terms, replacing the configured ones (repeatable)
    #[arg(short, long = "term")]
    terms: Vec<String>,

    /// Locations, replacing the configured ones (repeatable)
    #[arg(short, long = "location")]
    locations: Vec<String>,

    /// Output CSV path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum listings per query (0 = unbounded)
    #[arg(long)]
    max_results: Option<usize>,

    /// Maximum concurrent website visits
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

impl RunOverrides {
    fn apply(self, config: &mut HarvestConfig) {
        if !self.terms.is_empty() {
            config.search_term.clear();
            config.search_terms = self.terms;
        }
        if !self.locations.is_empty() {
            config.locations = self.locations;
        }
        if let Some(output) = self.output {
            config.output_filename = output;
        }
        if let Some(max) = self.max_results {
            config.max_results_per_query = max;
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent_pages = max;
        }
        if self.headed {
            config.headless = false;
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

/// Parse arguments and run the selected command.
pub async fn run(logs: RecentLogs) -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => HarvestConfig::config_path()?,
    };

    match cli.command {
        Commands::Run { overrides } => {
            let mut config = HarvestConfig::load_with_env(&config_path)?;
            overrides.apply(&mut config);
            config.validate()?;
            cmd_run(config, logs).await
        }
        Commands::Status { count } => {
            let config = HarvestConfig::load_with_env(&config_path)?;
            cmd_status(&config, count)
        }
        Commands::Clear => {
            let config = HarvestConfig::load_with_env(&config_path)?;
            cmd_clear(&config)
        }
        Commands::Config { command } => cmd_config(command, &config_path),
    }
}

async fn cmd_run(config: HarvestConfig, logs: RecentLogs) -> Result<()> {
    config.require_terms()?;

    let store = DedupStore::open(&config.output_filename).with_context(|| {
        format!(
            "failed to open results file {}",
            config.output_filename.display()
        )
    })?;
    if !store.is_empty() {
        tracing::info!(
            "Resuming with {} records and {} visited URLs",
            store.len(),
            store.visited_count()
        );
    }

    let browser = Arc::new(
        BrowserEngine::launch(config.headless)
            .await
            .context("failed to launch browser")?,
    );
    tracing::info!(user_agent = browser.default_user_agent(), "Browser ready");
    let driver: Arc<dyn BrowserDriver> = browser.clone();
    let engine = Engine::new(config, Arc::new(store), driver, logs);

    let Some(handle) = engine.start() else {
        bail!("engine is already running");
    };

    let stopper = engine.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current step...");
            stopper.stop();
        }
    });

    let result = handle.await.context("run task panicked")?;
    // The signal task holds an engine clone, and through it the browser
    cancel(ctrl_c).await;
    drop(engine);

    match Arc::try_unwrap(browser) {
        Ok(browser) => {
            if let Err(e) = browser.shutdown().await {
                tracing::warn!("Browser shutdown failed: {}", e);
            }
        }
        Err(_) => tracing::debug!("Browser still shared, leaving it to drop"),
    }

    let summary = result?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Abort a helper task and wait until it has dropped what it captured.
async fn cancel(task: JoinHandle<()>) {
    task.abort();
    let _ = task.await;
}

fn cmd_status(config: &HarvestConfig, count_only: bool) -> Result<()> {
    let store = DedupStore::open(&config.output_filename)?;
    if count_only {
        println!("{}", store.len());
        return Ok(());
    }

    let records = store.snapshot();
    let status = serde_json::json!({
        "state": EngineState::Idle,
        "running": false,
        "output": config.output_filename,
        "record_count": records.len(),
        "visited_count": store.visited_count(),
        "records": records,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn cmd_clear(config: &HarvestConfig) -> Result<()> {
    let store = DedupStore::open(&config.output_filename)?;
    let removed = store.len();
    store.clear()?;
    println!(
        "Cleared {} records from {}",
        removed,
        config.output_filename.display()
    );
    Ok(())
}

fn cmd_config(command: ConfigCommands, path: &std::path::Path) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = HarvestConfig::load_with_env(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init => {
            if path.exists() {
                println!("Config already exists at {}", path.display());
            } else {
                HarvestConfig::default().save(path)?;
                println!("Wrote default config to {}", path.display());
            }
        }
    }
    Ok(())
}
