//! # Demo Module
//!
//! The example scenario run by the `data_connector` binary. Each iteration
//! builds a fresh [`DataConnector`](crate::connections::DataConnector),
//! connects to every service, runs the sample operations for the services that
//! connected, and closes everything again.
//!
//! - **`scenario`**: one iteration and its [`IterationReport`].
//! - **`schedule`**: the repeat loop, bounded by an optional iteration count
//!   and stopped early through a cancellation token.

/// A single pass over the three services.
pub mod scenario;
/// The repeating, cancellable driver loop.
pub mod schedule;

pub use scenario::{run_iteration, IterationReport};
pub use schedule::{run_loop, DemoSchedule};

/// Every service points at a closed local port and S3 gets a single attempt.
#[cfg(test)]
pub(crate) fn unreachable_config() -> crate::configs::config_env::ConnectorConfig {
    let mut config = crate::configs::config_env::ConnectorConfig::from_lookup(|key| match key {
        "POSTGRES_HOST" | "CACHE_HOST" => Some("127.0.0.1".to_string()),
        "POSTGRES_PORT" | "CACHE_PORT" => Some("1".to_string()),
        "AWS_ACCESS_KEY_ID" => Some("AKIDEXAMPLE".to_string()),
        "AWS_SECRET_ACCESS_KEY" => Some("secret".to_string()),
        "AWS_ENDPOINT_URL" => Some("http://127.0.0.1:1".to_string()),
        "S3_FORCE_PATH_STYLE" => Some("true".to_string()),
        "AWS_MAX_ATTEMPTS" => Some("1".to_string()),
        _ => None,
    })
    .unwrap();
    config.postgres.connect_timeout = std::time::Duration::from_secs(1);
    config
}
