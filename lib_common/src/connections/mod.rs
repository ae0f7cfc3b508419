//! # Connections Module
//!
//! This module handles connections to external services: a PostgreSQL
//! database, a Redis cache and an S3 object store, all reachable through the
//! [`DataConnector`] facade.

/// Module for the PostgreSQL connection and statement execution.
pub mod db_postgres;

/// Module for Redis cache operations and connection handling.
pub mod cache_redis;

/// Module for S3 bucket listing, uploads and downloads.
pub mod store_s3;

/// The facade owning one handle per service.
pub mod facade;

/// Error taxonomy shared by every connection.
pub mod errors;

#[cfg(test)]
mod memory;

pub use cache_redis::{CacheStore, RedisCache};
pub use db_postgres::{is_read_query, render_row, PostgresHandle, SqlParams, StatementOutcome};
pub use errors::{ConnectorError, ErrorKind, Service};
pub use facade::{DataConnector, FailSoft};
pub use store_s3::{ObjectStorage, S3Storage};
