//! # Redis Cache Implementation
//!
//! Provides the cache handle used by the facade. The [`CacheStore`] trait is
//! the seam the facade talks to; [`RedisCache`] implements it over a
//! multiplexed async connection.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tracing::debug;

use super::errors::{ConnectorError, Service};
use crate::configs::config_env::{mask_url_password, CacheSettings};

/// Key-value operations the facade needs from a cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Liveness probe.
    async fn ping(&mut self) -> Result<(), ConnectorError>;

    /// Stores `value` under `key`, optionally expiring after `expiry`.
    async fn set(
        &mut self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<(), ConnectorError>;

    /// Fetches the value under `key`; `Ok(None)` when the key does not exist.
    async fn get(&mut self, key: &str) -> Result<Option<String>, ConnectorError>;

    /// Releases the underlying connection.
    async fn close(self: Box<Self>);
}

/// A handler for Redis cache interactions.
pub struct RedisCache {
    /// The shared async connection.
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Opens a connection and probes it with `PING`.
    ///
    /// # Arguments
    /// * `settings` - Host, port, logical database and optional password.
    pub async fn connect(settings: &CacheSettings) -> Result<Self, ConnectorError> {
        let url = settings
            .redis_url()
            .map_err(|e| ConnectorError::invalid_input(Service::Cache, e.to_string()))?;
        debug!("Opening Redis connection to {}", mask_url_password(url.as_str()));

        // Open the connection to the redis server
        let client = Client::open(url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;

        let mut cache = Self { conn };
        cache.ping().await?;
        Ok(cache)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn ping(&mut self) -> Result<(), ConnectorError> {
        let reply: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        debug!("Redis replied {} to PING", reply);
        Ok(())
    }

    async fn set(
        &mut self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<(), ConnectorError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        match expiry {
            Some(ttl) if ttl.subsec_millis() == 0 => {
                cmd.arg("EX").arg(ttl.as_secs());
            }
            Some(ttl) => {
                cmd.arg("PX").arg(ttl.as_millis() as u64);
            }
            None => {}
        }
        let _: () = cmd.query_async(&mut self.conn).await?;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<String>, ConnectorError> {
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut self.conn).await?;
        Ok(value)
    }

    async fn close(self: Box<Self>) {
        // Dropping the last handle shuts the multiplexed connection down.
        drop(self);
    }
}
