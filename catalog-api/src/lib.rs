//! Catalog API - HTTP Ingest Service
//!
//! Axum service in front of the tiered catalog cache. Product feeds post
//! batches to `POST /productos`; each batch is merged into the in-memory
//! table and persisted to the local snapshot and the remote object store
//! at most once per flush interval.

#[macro_use]
pub mod macros;

pub mod config;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{RemoteBackend, ServiceConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::{build_cache, ApiCache, AppState};
pub use types::*;
