//! # lib_common
//!
//! Shared building blocks for the data connector: typed settings resolved from
//! the environment, a connection facade over PostgreSQL, Redis and S3, the
//! tracing setup and the demo scenario that exercises all three services.

#![forbid(unsafe_code)]

// Declare the modules to re-export
#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "connections")]
pub mod connections;
#[cfg(feature = "demo")]
pub mod demo;
#[cfg(feature = "loggers")]
pub mod loggers;

// Re-export the types most callers need
#[cfg(feature = "configs")]
pub use configs::config_env::{
    CacheSettings, ConfigError, ConnectorConfig, ObjectStoreSettings, PostgresSettings,
};
#[cfg(feature = "connections")]
pub use connections::{ConnectorError, DataConnector, FailSoft, Service, StatementOutcome};
