//! # Sortline Supervisor Binary
//!
//! Runs the sorting line: RFID checkpoints, motion controller and the
//! live telemetry WebSocket.
//!
//! # Usage
//!
//! ```bash
//! # Real hardware, stock settings
//! sortline --config config/sortline.toml
//!
//! # Simulated peripherals
//! sortline --simulate -v
//!
//! # Telemetry on another port, JSON logs
//! sortline --bind 127.0.0.1:9000 --json
//! ```

use clap::Parser;
use sortline::LineContext;
use sortline_common::prelude::*;
use sortline_telemetry::server;
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/sortline.toml";

/// Sorting line supervisor
#[derive(Parser, Debug)]
#[command(name = "sortline")]
#[command(version)]
#[command(about = "Sorting line supervisor with RFID checkpoints and live telemetry")]
#[command(long_about = None)]
struct Args {
    /// Path to the line configuration file [default: config/sortline.toml if present]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use simulated peripherals instead of serial ports
    #[arg(short = 's', long)]
    simulate: bool,

    /// Telemetry listen address (overrides [telemetry] bind)
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    let level = match &config {
        Ok(Some((config, _))) => config.shared.log_level,
        _ => LogLevel::default(),
    };
    setup_tracing(&args, level);

    if let Err(e) = run(args, config).await {
        error!("sortline failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(
    args: Args,
    config: Result<Option<(LineConfig, PathBuf)>, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("sortline v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match config? {
        Some((config, path)) => {
            info!("loaded configuration from {}", path.display());
            config
        }
        None => {
            warn!(
                "{} not found, using built-in defaults",
                DEFAULT_CONFIG_PATH
            );
            LineConfig::default()
        }
    };
    if let Some(bind) = args.bind {
        config.telemetry.bind = bind;
    }

    let backend = if args.simulate {
        info!("simulation mode enabled");
        "simulation"
    } else {
        config.link.backend.name()
    };

    let listener = server::bind(&config.telemetry.bind).await?;
    let context = LineContext::build(config, backend, MonotonicClock::shared())?;

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received shutdown signal (Ctrl+C)"),
            Err(err) => error!("unable to listen for shutdown signal: {}", err),
        }
    };
    let summary = context.run(listener, shutdown).await?;

    info!("final state: {}", summary.last_snapshot.state);
    info!(
        "  - ticks: {} ({} overruns)",
        summary.ticks, summary.overruns
    );
    info!("  - completed cycles: {}", summary.completed_cycles);
    info!("sortline shutdown complete");
    Ok(())
}

/// Load and validate the config file.
///
/// An explicit path must exist; the default path may be missing, in which
/// case `None` is returned and built-in defaults apply.
fn load_config(explicit: Option<&Path>) -> Result<Option<(LineConfig, PathBuf)>, ConfigError> {
    match explicit {
        Some(path) => LineConfig::load_validated(path).map(|c| Some((c, path.to_path_buf()))),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            match LineConfig::load_validated(&path) {
                Ok(config) => Ok(Some((config, path))),
                Err(ConfigError::FileNotFound) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
