//! REST API Routes Module
//!
//! Includes:
//! - Product ingest and listing
//! - Health check endpoints
//! - Prometheus metrics and the OpenAPI document

pub mod health;
pub mod products;

use axum::{
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Create the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/productos",
            post(products::ingest_products).get(products::list_products),
        )
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
