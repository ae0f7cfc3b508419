//! # Data Connector Facade
//!
//! One owner for up to three independent handles: a PostgreSQL connection, a
//! cache and an object store. Each operation checks its own handle first and
//! returns [`ConnectorError::NotConnected`] without touching the network when
//! the handle is unset.
//!
//! Handles move between two states only. `connect_*` sets a handle (closing
//! any previous one first) and [`DataConnector::close_all`] clears the
//! PostgreSQL and cache handles. The object-store client holds no persistent
//! resource and is left in place.

use std::path::Path;
use std::time::Duration;

use tracing::{error, info};

use super::cache_redis::{CacheStore, RedisCache};
use super::db_postgres::{PostgresHandle, SqlParams, StatementOutcome};
use super::errors::{ConnectorError, Service};
use super::store_s3::{ObjectStorage, S3Storage};
use crate::configs::config_env::{CacheSettings, ObjectStoreSettings, PostgresSettings};

/// Owns the handles to the external services.
#[derive(Default)]
pub struct DataConnector {
    postgres: Option<PostgresHandle>,
    cache: Option<Box<dyn CacheStore>>,
    objects: Option<Box<dyn ObjectStorage>>,
}

impl DataConnector {
    /// Creates a facade with every handle unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self, service: Service) -> bool {
        match service {
            Service::Postgres => self.postgres.is_some(),
            Service::Cache => self.cache.is_some(),
            Service::ObjectStore => self.objects.is_some(),
        }
    }

    /// Connects to PostgreSQL. A previous connection is closed first; on
    /// failure the handle stays unset.
    pub async fn connect_postgres(&mut self, settings: &PostgresSettings) -> Result<(), ConnectorError> {
        if let Some(old) = self.postgres.take() {
            old.close().await;
        }
        let handle = PostgresHandle::connect(settings).await?;
        self.postgres = Some(handle);
        info!("Successfully connected to PostgreSQL at {}:{}", settings.host, settings.port);
        Ok(())
    }

    /// Connects to Redis and probes the connection with `PING`.
    pub async fn connect_cache(&mut self, settings: &CacheSettings) -> Result<(), ConnectorError> {
        self.release_cache().await;
        let cache = RedisCache::connect(settings).await?;
        self.cache = Some(Box::new(cache));
        info!("Successfully connected to Redis at {}:{}", settings.host, settings.port);
        Ok(())
    }

    /// Connects to S3 and lists the visible buckets, which are logged and returned.
    pub async fn connect_object_store(
        &mut self,
        settings: &ObjectStoreSettings,
    ) -> Result<Vec<String>, ConnectorError> {
        let storage = S3Storage::connect(settings).await;
        self.attach_object_store(Box::new(storage)).await
    }

    /// Installs an already-built cache handle, closing the previous one.
    ///
    /// The handle is probed with `PING` before it is kept.
    pub async fn attach_cache(&mut self, mut cache: Box<dyn CacheStore>) -> Result<(), ConnectorError> {
        self.release_cache().await;
        cache.ping().await?;
        self.cache = Some(cache);
        Ok(())
    }

    /// Installs an already-built object-store handle after listing its buckets.
    pub async fn attach_object_store(
        &mut self,
        storage: Box<dyn ObjectStorage>,
    ) -> Result<Vec<String>, ConnectorError> {
        self.objects = None;
        let buckets = storage.list_buckets().await?;
        info!("Successfully connected to S3!");
        info!("Available buckets: {:?}", buckets);
        self.objects = Some(storage);
        Ok(buckets)
    }

    /// Runs a statement against PostgreSQL.
    ///
    /// `SELECT` statements return [`StatementOutcome::Rows`]; anything else is
    /// committed and returns [`StatementOutcome::Committed`]. A write without
    /// parameters may contain several `;`-separated statements; queries and
    /// parameterized statements must be single statements.
    ///
    /// # Arguments
    /// * `statement` - SQL text using `$1`, `$2`, ... placeholders.
    /// * `params` - Values for the placeholders, `&[]` when there are none.
    pub async fn execute(
        &mut self,
        statement: &str,
        params: SqlParams<'_>,
    ) -> Result<StatementOutcome, ConnectorError> {
        let handle = self
            .postgres
            .as_mut()
            .ok_or(ConnectorError::NotConnected(Service::Postgres))?;
        handle.execute(statement, params).await
    }

    /// Stores a string in the cache. A zero `expiry` is rejected.
    pub async fn cache_set(
        &mut self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<(), ConnectorError> {
        let cache = self
            .cache
            .as_mut()
            .ok_or(ConnectorError::NotConnected(Service::Cache))?;
        if expiry.is_some_and(|ttl| ttl.as_millis() == 0) {
            return Err(ConnectorError::invalid_input(
                Service::Cache,
                "expiry must be at least one millisecond",
            ));
        }
        cache.set(key, value, expiry).await
    }

    /// Reads a string from the cache; `Ok(None)` when the key is absent.
    pub async fn cache_get(&mut self, key: &str) -> Result<Option<String>, ConnectorError> {
        let cache = self
            .cache
            .as_mut()
            .ok_or(ConnectorError::NotConnected(Service::Cache))?;
        cache.get(key).await
    }

    /// Uploads a local file and returns the object name used.
    ///
    /// # Arguments
    /// * `file_path` - The file to read.
    /// * `bucket` - Destination bucket.
    /// * `object_name` - Destination key; defaults to the file's base name.
    pub async fn upload_file(
        &self,
        file_path: &Path,
        bucket: &str,
        object_name: Option<&str>,
    ) -> Result<String, ConnectorError> {
        let storage = self
            .objects
            .as_ref()
            .ok_or(ConnectorError::NotConnected(Service::ObjectStore))?;

        let object_name = match object_name {
            Some(name) => name.to_string(),
            None => file_path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_owned)
                .ok_or_else(|| {
                    ConnectorError::invalid_input(
                        Service::ObjectStore,
                        format!("cannot derive an object name from {}", file_path.display()),
                    )
                })?,
        };

        let metadata = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| ConnectorError::local_file(file_path, e))?;
        if !metadata.is_file() {
            return Err(ConnectorError::invalid_input(
                Service::ObjectStore,
                format!("{} is not a regular file", file_path.display()),
            ));
        }

        storage.put_object(bucket, &object_name, file_path).await?;
        info!("File {} uploaded to {}/{}", file_path.display(), bucket, object_name);
        Ok(object_name)
    }

    /// Downloads an object to a local path and returns the number of bytes
    /// written.
    ///
    /// The body is streamed into a temporary file next to `destination`, which
    /// replaces `destination` only once the transfer has completed. On failure
    /// the temporary file is removed and `destination` is left untouched.
    pub async fn download_file(
        &self,
        bucket: &str,
        object_name: &str,
        destination: &Path,
    ) -> Result<u64, ConnectorError> {
        let storage = self
            .objects
            .as_ref()
            .ok_or(ConnectorError::NotConnected(Service::ObjectStore))?;

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // Deleted on drop unless persisted.
        let partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| ConnectorError::local_file(destination, e))?
            .into_temp_path();

        let written = storage.get_object(bucket, object_name, &partial).await?;
        partial
            .persist(destination)
            .map_err(|e| ConnectorError::local_file(destination, e.error))?;

        info!("File {}/{} downloaded to {}", bucket, object_name, destination.display());
        Ok(written)
    }

    /// Closes the PostgreSQL and cache handles if set. Never fails.
    pub async fn close_all(&mut self) {
        if let Some(handle) = self.postgres.take() {
            handle.close().await;
            info!("PostgreSQL connection closed");
        }
        if self.cache.is_some() {
            self.release_cache().await;
            info!("Redis connection closed");
        }
        info!("All connections closed");
    }

    async fn release_cache(&mut self) {
        if let Some(cache) = self.cache.take() {
            cache.close().await;
        }
    }
}

/// Converts a typed result into the sentinel form: the error is logged and
/// replaced by `None`.
pub trait FailSoft<T> {
    fn fail_soft(self, operation: &str) -> Option<T>;
}

impl<T> FailSoft<T> for Result<T, ConnectorError> {
    fn fail_soft(self, operation: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                error!(kind = ?e.kind(), "Failed to {}: {}", operation, e);
                None
            }
        }
    }
}
