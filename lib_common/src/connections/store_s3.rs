//! # S3 Object Storage
//!
//! The object-store handle used by the facade. [`ObjectStorage`] is the seam;
//! [`S3Storage`] implements it with the official AWS SDK, which also works
//! against S3-compatible endpoints when `endpoint_url` and path-style
//! addressing are configured.

use std::path::Path;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::errors::{from_sdk_error, ConnectorError, Service};
use crate::configs::config_env::ObjectStoreSettings;

/// Bucket and object operations the facade needs from an object store.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Names of the buckets visible to the configured credentials.
    async fn list_buckets(&self) -> Result<Vec<String>, ConnectorError>;

    /// Streams the file at `source` to `bucket/key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> Result<(), ConnectorError>;

    /// Streams `bucket/key` into a newly created file at `destination` and
    /// returns the number of bytes written. On error the file may hold a
    /// partial body; callers own its cleanup.
    async fn get_object(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64, ConnectorError>;
}

/// An S3 client built from [`ObjectStoreSettings`].
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Builds the client. No request is sent; the facade probes the handle
    /// with [`ObjectStorage::list_buckets`].
    ///
    /// Static credentials are used when both keys are configured, otherwise
    /// the SDK default provider chain (profile, web identity, IMDS) applies.
    pub async fn connect(settings: &ObjectStoreSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(settings.max_attempts));

        if let (Some(key_id), Some(secret)) = (&settings.access_key_id, &settings.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "environment",
            ));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            debug!("Using custom S3 endpoint {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_buckets(&self) -> Result<Vec<String>, ConnectorError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(from_sdk_error)?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_owned))
            .collect())
    }

    async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> Result<(), ConnectorError> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| ConnectorError::local_file(source, std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64, ConnectorError> {
        let mut output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(from_sdk_error)?;

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| ConnectorError::local_file(destination, e))?;

        let mut written = 0u64;
        while let Some(chunk) = output.body.try_next().await.map_err(|e| ConnectorError::Network {
            service: Service::ObjectStore,
            message: format!("failed reading object body: {}", e),
        })? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ConnectorError::local_file(destination, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ConnectorError::local_file(destination, e))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_settings() -> ObjectStoreSettings {
        ObjectStoreSettings {
            region: "eu-central-1".to_string(),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            endpoint_url: Some("http://127.0.0.1:1".to_string()),
            force_path_style: true,
            max_attempts: 1,
            bucket_name: "example-bucket".to_string(),
        }
    }

    #[tokio::test]
    async fn test_listing_against_closed_port_is_network_error() {
        let storage = S3Storage::connect(&unreachable_settings()).await;
        let err = storage.list_buckets().await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
        assert_eq!(err.service(), Some(Service::ObjectStore));
    }

    /// Needs a reachable bucket; configure the AWS_* / S3_* variables and run with `--ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_live_put_then_get_round_trip() {
        let config = crate::configs::config_env::ConnectorConfig::from_env().unwrap();
        let storage = S3Storage::connect(&config.object_store).await;
        let bucket = &config.object_store.bucket_name;
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.bin");
        let target = dir.path().join("download.bin");
        std::fs::write(&source, [0u8, 1, 2, 255]).unwrap();

        storage.put_object(bucket, "lib_common-test.bin", &source).await.unwrap();
        let written = storage
            .get_object(bucket, "lib_common-test.bin", &target)
            .await
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(std::fs::read(&target).unwrap(), vec![0, 1, 2, 255]);
    }
}
