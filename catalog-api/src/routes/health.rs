//! Health Check Endpoints
//!
//! - /health - Liveness, always ok while the process serves requests
//! - /health/ready - Whether the catalog table has been loaded

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::ApiCache;

// ============================================================================
// TYPES
// ============================================================================

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    /// True once the table has been loaded from a tier or bootstrapped empty.
    pub initialized: bool,
    pub rows: usize,
    /// True while merged changes have not been flushed yet.
    pub dirty: bool,
    pub uptime_seconds: u64,
    pub version: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health - Liveness check
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = HealthResponse),
    ),
)]
pub async fn health() -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check
///
/// Reports the published cache status without forcing a load or waiting on
/// the cache lock, so it answers promptly even during a slow load or flush.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Cache state", body = ReadinessResponse),
    ),
)]
pub async fn readiness(
    State(cache): State<Arc<ApiCache>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let status = cache.status();
    let response = ReadinessResponse {
        status: if status.initialized { "ready" } else { "idle" }.to_string(),
        initialized: status.initialized,
        rows: status.rows,
        dirty: status.dirty,
        uptime_seconds: start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    (StatusCode::OK, Json(response))
}
