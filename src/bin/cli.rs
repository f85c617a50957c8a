//! pco-export CLI
//!
//! Fetches calendar events and ministry pages from Planning Center and
//! writes them where the static site build expects them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use pco_export::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, ExportPaths},
    services::{Credentials, PlanningCenterClient, RateLimiter},
};

/// Planning Center exporter for the church website
#[derive(Parser, Debug)]
#[command(
    name = "pco-export",
    version,
    about = "Export Planning Center events and ministry pages"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "pco-export.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export calendar instances to {data_dir}/events
    Events {
        #[arg(long)]
        data_dir: PathBuf,

        #[arg(long)]
        assets_dir: PathBuf,
    },

    /// Export ministry pages to {data_dir}/ministries
    Ministries {
        #[arg(long)]
        data_dir: PathBuf,

        #[arg(long, alias = "asset-dir")]
        assets_dir: PathBuf,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// An explicitly named config must exist; the default one may be absent.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else if path == Path::new("pco-export.toml") {
        Ok(Config::load_or_default(path))
    } else {
        Err(AppError::config(format!(
            "Config file not found: {}",
            path.display()
        )))
    }
}

fn connect(config: &Config) -> Result<PlanningCenterClient> {
    let credentials = Credentials::from_env()?;
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    PlanningCenterClient::new(&config.api, credentials, limiter)
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Events {
            data_dir,
            assets_dir,
        } => {
            let client = connect(&config)?;
            let paths = ExportPaths::new(data_dir, assets_dir);
            pipeline::run_events_export(&config, &client, &paths, Utc::now()).await?;
            log::info!("API calls: {}", client.limiter().total_calls());
        }

        Command::Ministries {
            data_dir,
            assets_dir,
        } => {
            let client = connect(&config)?;
            let paths = ExportPaths::new(data_dir, assets_dir);
            pipeline::run_ministries_export(&config, &client, &paths).await?;
            log::info!("API calls: {}", client.limiter().total_calls());
        }

        Command::Validate => {
            log::info!("Configuration is valid ({} ministries)", config.ministries.len());
        }
    }

    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; credentials may come from the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    tokio::select! {
        result = run(cli, config) => result?,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, discarding staged output");
            return Err(AppError::Cancelled);
        }
    }

    log::info!("Done!");
    Ok(())
}
