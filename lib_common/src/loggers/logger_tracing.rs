//! # Tracing Setup
//!
//! Installs the global `tracing` subscriber: a console layer, plus a daily
//! rolling file layer when a log directory is configured. `RUST_LOG` takes
//! precedence over the level passed in.

use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// How many rolled files of an application survive startup pruning.
pub const KEEP_LOG_FILES: usize = 7;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Failed to prepare log directory {}: {source}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Maps a level name to a filter; unknown names fall back to `info`.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" | "warning" => LevelFilter::WARN,
        "error" | "fatal" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for the lifetime of the program. It is `None` without a log dir.
///
/// # Arguments
/// * `app_name` - Prefix of the log files (`<app_name>.log.YYYY-MM-DD`).
/// * `level` - Default level when `RUST_LOG` is not set.
/// * `log_dir` - Directory for rolling files; console only when `None`.
pub fn init_tracing(
    app_name: &str,
    level: &str,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, LoggerError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level_filter(level).into()));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggerError::LogDir {
                path: dir.to_path_buf(),
                source,
            })?;
            prune_old_logs(dir, app_name, KEEP_LOG_FILES)?;

            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Deletes all but the newest `keep` rolled files of `app_name` in `log_dir`.
///
/// Rolled files carry a date suffix, so name order is age order. Returns the
/// number of files removed; files that cannot be removed are reported on
/// stderr and skipped.
pub fn prune_old_logs(log_dir: &Path, app_name: &str, keep: usize) -> Result<usize, LoggerError> {
    let pattern = format!(
        "{}/{}.log.*",
        Pattern::escape(&log_dir.to_string_lossy()),
        Pattern::escape(app_name)
    );

    let mut log_files: Vec<PathBuf> = glob(&pattern)?.filter_map(Result::ok).collect();
    // Newest first.
    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = 0;
    for old_file in log_files.iter().skip(keep) {
        match std::fs::remove_file(old_file) {
            Ok(()) => removed += 1,
            // The subscriber is not installed yet at this point.
            Err(e) => eprintln!("Error deleting old log file {}: {}", old_file.display(), e),
        }
    }
    Ok(removed)
}
