//! Service Configuration Module
//!
//! Configuration for the HTTP listener, the two persistence tiers and the
//! flush policy. Everything is loaded from environment variables with
//! defaults suitable for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use catalog_storage::{CacheConfig, HttpObjectStoreConfig, S3ObjectStoreConfig};

use crate::error::{ApiError, ApiResult};

const DEFAULT_ENDPOINT: &str = "https://s3.amazonaws.com";

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Which object store backs the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBackend {
    /// No bucket configured; the remote tier lives in process memory.
    InMemory,
    /// Amazon S3 (or an S3-compatible service) with SigV4 credentials.
    S3,
    /// HTTP gateway authenticated with a bearer token.
    HttpGateway,
}

/// Runtime configuration for the catalog service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    // ========================================================================
    // Listener
    // ========================================================================
    /// Interface to bind.
    pub bind_host: String,

    /// TCP port to listen on.
    pub port: u16,

    // ========================================================================
    // Local tier
    // ========================================================================
    /// Directory holding the local snapshot file.
    pub data_dir: PathBuf,

    /// File name of the local snapshot.
    pub snapshot_file: String,

    // ========================================================================
    // Remote tier
    // ========================================================================
    /// Bucket for the remote snapshot. `None` selects an in-memory store.
    pub bucket: Option<String>,

    /// Object key of the remote snapshot.
    pub object_key: String,

    /// AWS region of the bucket.
    pub region: Option<String>,

    /// Explicit endpoint override (`S3_ENDPOINT`), e.g. a MinIO URL.
    pub endpoint_override: Option<String>,

    /// Base URL used by the HTTP gateway client.
    pub object_store_endpoint: String,

    /// Bearer token for an HTTP gateway. Setting it selects the gateway
    /// client instead of the S3 client.
    pub object_store_token: Option<String>,

    /// Timeout for a single object store request.
    pub request_timeout: Duration,

    // ========================================================================
    // Flushing
    // ========================================================================
    /// Minimum spacing between debounced flushes.
    pub flush_interval: Duration,

    /// Also flush from a background timer, not only after merges.
    pub periodic_flush: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("data"),
            snapshot_file: "datos_endpoint.snapshot".to_string(),
            bucket: None,
            object_key: "catalog/data_endpoint/datos_endpoint.snapshot".to_string(),
            region: None,
            endpoint_override: None,
            object_store_endpoint: DEFAULT_ENDPOINT.to_string(),
            object_store_token: None,
            request_timeout: Duration::from_secs(30),
            flush_interval: Duration::from_secs(15),
            periodic_flush: false,
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CATALOG_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` / `CATALOG_API_PORT`: Listen port (default: 8000)
    /// - `CATALOG_DATA_DIR`: Local snapshot directory (default: data)
    /// - `CATALOG_SNAPSHOT_FILE`: Local snapshot file name (default: datos_endpoint.snapshot)
    /// - `S3_BUCKET`: Remote bucket (unset = in-memory remote tier)
    /// - `CATALOG_OBJECT_KEY`: Remote object key
    /// - `S3_REGION`: AWS region of the bucket
    /// - `S3_ENDPOINT`: Custom S3-compatible endpoint
    /// - `CATALOG_OBJECT_STORE_TOKEN`: Bearer token; selects the HTTP gateway client
    ///
    /// The S3 client also reads the standard `AWS_*` credential variables.
    /// - `CATALOG_REQUEST_TIMEOUT_SECS`: Object store request timeout (default: 30)
    /// - `CATALOG_FLUSH_INTERVAL_SECS`: Flush debounce interval (default: 15)
    /// - `CATALOG_PERIODIC_FLUSH`: "true" to flush from a background timer (default: false)
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match non_empty("PORT").or_else(|| non_empty("CATALOG_API_PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let region = non_empty("S3_REGION");
        let endpoint_override = non_empty("S3_ENDPOINT");
        let object_store_endpoint = endpoint_override
            .clone()
            .or_else(|| region.as_ref().map(|region| format!("https://s3.{}.amazonaws.com", region)))
            .unwrap_or(defaults.object_store_endpoint);

        let secs = |key: &str, default: Duration| -> ApiResult<Duration> {
            match non_empty(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ApiError::invalid_input(format!("Invalid value for {}: {}", key, raw))),
                None => Ok(default),
            }
        };

        Ok(Self {
            bind_host: non_empty("CATALOG_API_BIND").unwrap_or(defaults.bind_host),
            port,
            data_dir: non_empty("CATALOG_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            snapshot_file: non_empty("CATALOG_SNAPSHOT_FILE").unwrap_or(defaults.snapshot_file),
            bucket: non_empty("S3_BUCKET"),
            object_key: non_empty("CATALOG_OBJECT_KEY").unwrap_or(defaults.object_key),
            region,
            endpoint_override,
            object_store_endpoint,
            object_store_token: non_empty("CATALOG_OBJECT_STORE_TOKEN"),
            request_timeout: secs("CATALOG_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            flush_interval: secs("CATALOG_FLUSH_INTERVAL_SECS", defaults.flush_interval)?,
            periodic_flush: non_empty("CATALOG_PERIODIC_FLUSH")
                .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
                .unwrap_or(defaults.periodic_flush),
        })
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }

    /// Full path of the local snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().with_flush_interval(self.flush_interval)
    }

    /// Object store the remote tier should use.
    pub fn remote_backend(&self) -> RemoteBackend {
        match (&self.bucket, &self.object_store_token) {
            (None, _) => RemoteBackend::InMemory,
            (Some(_), Some(_)) => RemoteBackend::HttpGateway,
            (Some(_), None) => RemoteBackend::S3,
        }
    }

    /// S3 client settings for `bucket`.
    pub fn s3_config(&self, bucket: &str) -> S3ObjectStoreConfig {
        let mut config = S3ObjectStoreConfig::new(bucket).with_timeout(self.request_timeout);
        if let Some(region) = &self.region {
            config = config.with_region(region.clone());
        }
        if let Some(endpoint) = &self.endpoint_override {
            config = config.with_endpoint(endpoint.clone());
        }
        config
    }

    pub fn object_store_config(&self) -> HttpObjectStoreConfig {
        HttpObjectStoreConfig {
            endpoint: self.object_store_endpoint.clone(),
            bearer_token: self.object_store_token.clone(),
            timeout: self.request_timeout,
        }
    }
}
