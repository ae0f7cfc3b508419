//! # Data Connector Demo
//!
//! Runs the example scenario against PostgreSQL, Redis and S3 in a loop.
//!
//! Service settings come from the environment (a `.env` file in the working
//! directory is loaded first). Each iteration connects, runs the sample
//! statements, cache calls and file transfer, then closes everything. A
//! failing service is logged and skipped; the loop keeps going until the
//! iteration bound is reached or Ctrl-C is pressed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lib_common::ConnectorConfig;
use lib_common::demo::{run_loop, DemoSchedule};
use lib_common::loggers::init_tracing;

const APP_NAME: &str = "data_connector";

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Connects to PostgreSQL, Redis and S3 and runs example operations in a loop."
)]
#[clap(long_about = None)]
struct Args {
    /// Stop after this many iterations. Runs until Ctrl-C when omitted.
    #[clap(long, env = "CONNECTOR_ITERATIONS")]
    iterations: Option<u64>,

    /// Seconds to wait between iterations.
    #[clap(long, env = "CONNECTOR_INTERVAL_SECS", default_value_t = 3)]
    interval_secs: u64,

    /// Directory where the upload and download files are written.
    #[clap(long, env = "CONNECTOR_WORKDIR", default_value = ".")]
    workdir: PathBuf,

    /// Additional dotenv file loaded after `.env`.
    #[clap(long)]
    env_file: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[clap(long, env = "CONNECTOR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write daily rolling log files into this directory.
    #[clap(long, env = "CONNECTOR_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; the process environment may carry everything.
    let dotenv_loaded = dotenvy::dotenv().ok();

    let args = Args::parse();
    if let Some(path) = &args.env_file {
        dotenvy::from_path(path)
            .with_context(|| format!("Failed to load env file {}", path.display()))?;
    }

    let _log_guard = init_tracing(APP_NAME, &args.log_level, args.log_dir.as_deref())
        .context("Failed to initialize logging")?;

    match dotenv_loaded {
        Some(path) => info!("Loaded environment from {}", path.display()),
        None => warn!("No .env file found, using the process environment"),
    }

    let config = ConnectorConfig::from_env().context("Invalid connector configuration")?;
    info!("Configuration loaded: {}", config);

    tokio::fs::create_dir_all(&args.workdir)
        .await
        .with_context(|| format!("Failed to create workdir {}", args.workdir.display()))?;

    let schedule = DemoSchedule {
        interval: Duration::from_secs(args.interval_secs),
        iterations: args.iterations,
    };

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current step");
                ctrl_c_token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let completed = run_loop(&config, &schedule, &args.workdir, token).await;
    info!("{} finished after {} iteration(s)", APP_NAME, completed);
    Ok(())
}
