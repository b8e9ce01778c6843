//! # Launchgate - Container Entrypoint
//!
//! Holds the application back until its database accepts connections,
//! applies schema migrations, then launches the server with the mounted
//! service account token in its environment.
//!
//! ## Sequence
//! ```text
//! DB_HOST:DB_PORT reachable? → migrations → token → application server
//!        ↺ retry every 5s                          ↳ exit code mirrored
//! ```
//!
//! SIGINT and SIGTERM stop whichever step is running; a launched server
//! receives SIGTERM and is killed if it outlives its grace period.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use launchgate::{AppConfig, Overrides, shutdown, startup};
use launchgate_common::LaunchError;
use launchgate_common::constants::{DEFAULT_CONFIG_PATH, exit_codes};

/// Launchgate - wait for the database, migrate, launch
#[derive(Parser, Debug)]
#[command(name = "launchgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Database host to wait for (overrides config)
    #[arg(long, env = "DB_HOST")]
    db_host: Option<String>,

    /// Database port to wait for (overrides config)
    #[arg(long, env = "DB_PORT")]
    db_port: Option<String>,

    /// Pause between probe attempts in milliseconds (overrides config)
    #[arg(long)]
    retry_interval_ms: Option<u64>,

    /// Give up after this many probe attempts (default: retry forever)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            db_host: self.db_host.clone(),
            db_port: self.db_port.clone(),
            retry_interval_ms: self.retry_interval_ms,
            max_attempts: self.max_attempts,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; real deployments set variables directly
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level, args.json_logs) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::from(exit_codes::FAILURE);
    }

    match run(args).await {
        Ok(()) => {
            info!("👋 Launchgate finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let message = format!("{e:#}");
            let retryable = e
                .downcast_ref::<LaunchError>()
                .is_some_and(LaunchError::is_retryable);
            tracing::error!(error = %message, retryable, "Startup failed");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("🔥 Starting Launchgate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args.overrides())?;
    info!("📋 Configuration loaded from {}", args.config);

    // Create shutdown broadcast channel, fed by SIGINT and SIGTERM
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let signals = shutdown::Signals::install().context("Failed to install signal handlers")?;
    tokio::spawn(signals.forward(shutdown_tx.clone()));

    startup::run(&config, &shutdown_tx)
        .await
        .context("Startup sequence failed")
}

/// Exit code for a failed run: the launch error's own code when there is one
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<LaunchError>()
        .map(LaunchError::exit_code)
        .unwrap_or(exit_codes::CONFIG)
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to install JSON subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .context("Failed to install subscriber")?;
    }

    Ok(())
}
