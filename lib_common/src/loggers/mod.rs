/// Sets up the `tracing` subscriber with console and rolling file output.
pub mod logger_tracing;

pub use logger_tracing::{init_tracing, level_filter, prune_old_logs, LoggerError};
