//! OpenAPI Document for the Catalog API
//!
//! Generated with utoipa from the route annotations and the wire types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{self, HealthResponse, ReadinessResponse};
use crate::routes::products;
use crate::telemetry::metrics;
use crate::types::{CatalogResponse, FlushStatus, IngestResponse, PayloadProductos, Producto};

/// OpenAPI document for the catalog ingest service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog API",
        version = "0.1.0",
        description = "Product catalog ingest with a local snapshot and a remote object store",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Products", description = "Batch upsert and listing of catalog products"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        products::ingest_products,
        products::list_products,
        health::health,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            Producto, PayloadProductos, IngestResponse, FlushStatus, CatalogResponse,
            HealthResponse, ReadinessResponse,
        )
    )
)]
pub struct ApiDoc;
