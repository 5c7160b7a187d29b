//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use catalog_storage::{
    BackingStore, FileTier, HttpObjectStore, InMemoryObjectStore, ObjectStore, ObjectTier,
    S3ObjectStore, TieredCache,
};

use crate::config::{RemoteBackend, ServiceConfig};
use crate::error::{ApiError, ApiResult};

/// Bucket name used when no remote bucket is configured.
const IN_MEMORY_BUCKET: &str = "in-memory";

/// Type alias for the tiered cache used by the API.
///
/// The local tier is a snapshot file; the remote tier is a single object in
/// whichever object store the configuration selects.
pub type ApiCache = TieredCache<FileTier, ObjectTier>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// The catalog table and its persistence tiers.
    pub cache: Arc<ApiCache>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cache: Arc<ApiCache>) -> Self {
        Self {
            cache,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<ApiCache>, cache);
crate::impl_from_ref!(Instant, start_time);

/// Build the tiered cache described by `config`.
///
/// With `S3_BUCKET` set the remote tier is the S3 bucket, reached through a
/// SigV4-signing client, or through a bearer-token HTTP gateway when a token
/// is configured. Without a bucket the remote tier lives in process memory,
/// which is only useful for local development: nothing survives a restart
/// except the local snapshot file.
pub fn build_cache(config: &ServiceConfig) -> ApiResult<ApiCache> {
    let local = FileTier::new(config.snapshot_path());
    let client_error =
        |e: catalog_core::StorageError| ApiError::internal_error(format!("Failed to create object store client: {}", e));

    let (store, bucket): (Arc<dyn ObjectStore>, String) = match (config.remote_backend(), &config.bucket) {
        (RemoteBackend::S3, Some(bucket)) => {
            let store: Arc<dyn ObjectStore> =
                Arc::new(S3ObjectStore::new(config.s3_config(bucket)).map_err(client_error)?);
            tracing::info!(
                bucket = %bucket,
                region = ?config.region,
                endpoint = ?config.endpoint_override,
                key = %config.object_key,
                "Using S3 object store for the remote tier"
            );
            (store, bucket.clone())
        }
        (RemoteBackend::HttpGateway, Some(bucket)) => {
            let store: Arc<dyn ObjectStore> =
                Arc::new(HttpObjectStore::new(config.object_store_config()).map_err(client_error)?);
            tracing::info!(
                endpoint = %config.object_store_endpoint,
                bucket = %bucket,
                key = %config.object_key,
                "Using HTTP object store gateway for the remote tier"
            );
            (store, bucket.clone())
        }
        _ => {
            tracing::warn!("S3_BUCKET not set, remote tier is in-memory and will not survive restarts");
            let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
            (store, IN_MEMORY_BUCKET.to_string())
        }
    };
    let remote = ObjectTier::new(store, bucket, config.object_key.clone());

    tracing::info!(
        path = %config.snapshot_path().display(),
        flush_interval_secs = config.flush_interval.as_secs(),
        "Catalog cache configured"
    );

    Ok(TieredCache::new(
        BackingStore::new(local, remote),
        config.cache_config(),
    ))
}
