//! Remote object store clients and the remote tier built on them.
//!
//! The store contract is minimal: a blob identified by `(bucket, key)` can be
//! fetched or overwritten. [`ObjectTier`] binds a store to the one object that
//! backs the catalog and handles snapshot encoding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catalog_core::{StorageError, Table, Tier};
use reqwest::StatusCode;
use tokio::sync::RwLock;

use crate::codec;
use crate::tier::RemoteTier;

/// Key-addressable blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object. `Ok(None)` means the object does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or overwrite an object.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Process-local object store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}

// ============================================================================
// HTTP STORE
// ============================================================================

/// Configuration for [`HttpObjectStore`].
#[derive(Debug, Clone)]
pub struct HttpObjectStoreConfig {
    /// Base URL, e.g. `https://s3.eu-west-1.amazonaws.com`.
    pub endpoint: String,
    /// Optional bearer token sent with every request.
    pub bearer_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.amazonaws.com".to_string(),
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Object store speaking path-style S3-compatible HTTP:
/// `GET`/`PUT {endpoint}/{bucket}/{key}`.
///
/// A 404 response, or an error body carrying the S3 `NoSuchKey` code, is
/// reported as a missing object. Any other non-success status is an error.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    config: HttpObjectStoreConfig,
}

impl HttpObjectStore {
    /// Build a store from configuration.
    pub fn new(config: HttpObjectStoreConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Remote {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            bucket,
            key.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn remote_error(action: &str, url: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Remote {
        reason: format!("{} {}: {}", action, url, err),
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let url = self.url(bucket, key);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| remote_error("GET", &url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("<Code>NoSuchKey</Code>") {
                return Ok(None);
            }
            return Err(remote_error("GET", &url, format!("status {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| remote_error("GET", &url, e))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let url = self.url(bucket, key);
        let response = self
            .authorize(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| remote_error("PUT", &url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote_error("PUT", &url, format!("status {}", status)));
        }
        Ok(())
    }
}

// ============================================================================
// OBJECT TIER
// ============================================================================

/// Remote tier storing the catalog snapshot as one object.
#[derive(Clone)]
pub struct ObjectTier {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
}

impl ObjectTier {
    /// Bind `store` to the object at `bucket`/`key`.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Bucket holding the snapshot.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key of the snapshot.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for ObjectTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectTier")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteTier for ObjectTier {
    async fn load(&self) -> Result<Option<Table>, StorageError> {
        match self.store.get(&self.bucket, &self.key).await? {
            Some(bytes) => codec::decode(&bytes, Tier::Remote).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, table: &Table) -> Result<(), StorageError> {
        let bytes = codec::encode(table)?;
        self.store.put(&self.bucket, &self.key, bytes).await
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}
