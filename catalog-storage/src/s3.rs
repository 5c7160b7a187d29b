//! Amazon S3 object store.
//!
//! Requests are signed with SigV4 by the `object_store` crate. Credentials and
//! defaults come from the standard AWS environment (`AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`, `AWS_REGION`, instance
//! metadata), so a private bucket is reachable with the same setup the AWS
//! CLI uses.

use std::sync::Arc;
use std::time::Duration;

use ::object_store::aws::AmazonS3Builder;
use ::object_store::path::Path as ObjectPath;
use ::object_store::{ClientOptions, Error as ObjectStoreError, ObjectStore as _, PutPayload};
use async_trait::async_trait;
use catalog_core::StorageError;
use tracing::debug;

use crate::object_store::ObjectStore;

/// Configuration for [`S3ObjectStore`].
#[derive(Debug, Clone)]
pub struct S3ObjectStoreConfig {
    /// Bucket the store is bound to.
    pub bucket: String,
    /// AWS region. Falls back to `AWS_REGION`, then `us-east-1`.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services such as MinIO.
    pub endpoint: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl S3ObjectStoreConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`ObjectStore`] over one S3 bucket.
///
/// A missing object is reported as `Ok(None)`. Requests naming any other
/// bucket are refused.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    bucket: String,
    inner: Arc<dyn ::object_store::ObjectStore>,
}

impl S3ObjectStore {
    /// Build an S3 client from configuration. No request is sent until the
    /// first `get` or `put`.
    pub fn new(config: S3ObjectStoreConfig) -> Result<Self, StorageError> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::Remote {
                reason: "S3 bucket name is empty".to_string(),
            });
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(config.bucket.clone())
            .with_client_options(ClientOptions::new().with_timeout(config.timeout));
        if let Some(region) = &config.region {
            builder = builder.with_region(region.clone());
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_allow_http(endpoint.starts_with("http://"))
                .with_endpoint(endpoint.clone());
        }

        let store = builder.build().map_err(|e| StorageError::Remote {
            reason: format!("failed to configure S3 client: {}", e),
        })?;
        Ok(Self::from_store(config.bucket, Arc::new(store)))
    }

    /// Wrap an already configured `object_store` backend bound to `bucket`.
    pub fn from_store(bucket: impl Into<String>, inner: Arc<dyn ::object_store::ObjectStore>) -> Self {
        Self {
            bucket: bucket.into(),
            inner,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn path(&self, bucket: &str, key: &str) -> Result<ObjectPath, StorageError> {
        if bucket != self.bucket {
            return Err(StorageError::Remote {
                reason: format!(
                    "S3 client is bound to bucket '{}', not '{}'",
                    self.bucket, bucket
                ),
            });
        }
        ObjectPath::parse(key).map_err(|e| StorageError::Remote {
            reason: format!("invalid object key '{}': {}", key, e),
        })
    }

    fn remote_error(&self, op: &str, key: &str, e: ObjectStoreError) -> StorageError {
        StorageError::Remote {
            reason: format!("{} s3://{}/{}: {}", op, self.bucket, key, e),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path(bucket, key)?;

        let result = match self.inner.get(&path).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => {
                debug!(bucket, key, "S3 object not found");
                return Ok(None);
            }
            Err(e) => return Err(self.remote_error("GET", key, e)),
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| self.remote_error("GET", key, e))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path(bucket, key)?;
        self.inner
            .put(&path, PutPayload::from(body))
            .await
            .map_err(|e| self.remote_error("PUT", key, e))?;
        Ok(())
    }
}
