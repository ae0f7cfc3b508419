//! In-memory doubles for [`CacheStore`] and [`ObjectStorage`], used by the
//! facade tests. State lives behind an `Arc` so a test keeps a view after
//! handing the double to the facade.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::cache_redis::CacheStore;
use super::errors::{ConnectorError, Service};
use super::store_s3::ObjectStorage;

#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Option<Duration>)>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryCache {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn expiry_of(&self, key: &str) -> Option<Duration> {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .get(key)
            .and_then(|(_, expiry)| *expiry)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn ping(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn set(
        &mut self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<(), ConnectorError> {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(key.to_string(), (value.to_string(), expiry));
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<String>, ConnectorError> {
        Ok(self
            .entries
            .lock()
            .expect("cache mutex poisoned")
            .get(key)
            .map(|(value, _)| value.clone()))
    }

    async fn close(self: Box<Self>) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct MemoryObjectStorage {
    buckets: Arc<Mutex<HashMap<String, HashMap<String, Vec<u8>>>>>,
    /// When set, downloads write half of the body and then fail.
    interrupt_downloads: Arc<AtomicBool>,
}

impl MemoryObjectStorage {
    pub fn with_buckets(names: &[&str]) -> Self {
        let storage = Self::default();
        {
            let mut buckets = storage.buckets.lock().expect("storage mutex poisoned");
            for name in names {
                buckets.insert(name.to_string(), HashMap::new());
            }
        }
        storage
    }

    pub fn interrupt_downloads(&self) {
        self.interrupt_downloads.store(true, Ordering::SeqCst);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .expect("storage mutex poisoned")
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }
}

fn no_such(code: &str, what: String) -> ConnectorError {
    ConnectorError::invalid_input(Service::ObjectStore, format!("{}: {}", code, what))
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn list_buckets(&self) -> Result<Vec<String>, ConnectorError> {
        let mut names: Vec<String> = self
            .buckets
            .lock()
            .expect("storage mutex poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> Result<(), ConnectorError> {
        let body = tokio::fs::read(source)
            .await
            .map_err(|e| ConnectorError::local_file(source, e))?;
        let mut buckets = self.buckets.lock().expect("storage mutex poisoned");
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such("NoSuchBucket", bucket.to_string()))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64, ConnectorError> {
        let body = self
            .object(bucket, key)
            .ok_or_else(|| no_such("NoSuchKey", format!("{}/{}", bucket, key)))?;

        if self.interrupt_downloads.load(Ordering::SeqCst) {
            tokio::fs::write(destination, &body[..body.len() / 2])
                .await
                .map_err(|e| ConnectorError::local_file(destination, e))?;
            return Err(ConnectorError::Network {
                service: Service::ObjectStore,
                message: "connection reset while reading object body".to_string(),
            });
        }

        tokio::fs::write(destination, &body)
            .await
            .map_err(|e| ConnectorError::local_file(destination, e))?;
        Ok(body.len() as u64)
    }
}
