//! Product Ingest Routes
//!
//! `POST /productos` merges a batch into the catalog table and then lets the
//! flush scheduler decide whether to persist it. `GET /productos` returns the
//! current table.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    response::IntoResponse,
    Json,
};
use catalog_core::Record;
use catalog_storage::FlushOutcome;

use crate::{
    error::{ApiError, ApiResult},
    state::ApiCache,
    telemetry::metrics,
    types::{CatalogResponse, FlushStatus, IngestResponse, PayloadProductos},
};

const INGEST_MESSAGE: &str = "Productos procesados correctamente";

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /productos - Upsert a batch of products
#[utoipa::path(
    post,
    path = "/productos",
    tag = "Products",
    request_body = PayloadProductos,
    responses(
        (status = 200, description = "Batch merged", body = IngestResponse),
        (status = 400, description = "Empty or malformed payload", body = ApiError),
        (status = 422, description = "Payload does not match the product schema", body = ApiError),
        (status = 503, description = "Catalog storage unavailable", body = ApiError),
    ),
)]
pub async fn ingest_products(
    State(cache): State<Arc<ApiCache>>,
    client: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<PayloadProductos>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let client = client.map(|ConnectInfo(addr)| addr.to_string());
    let Json(payload) = payload.map_err(|rejection| {
        tracing::warn!(client = ?client, error = %rejection.body_text(), "Rejected product payload");
        ApiError::from(rejection)
    })?;

    if payload.productos.is_empty() {
        tracing::warn!(client = ?client, "Empty product payload");
        return Err(ApiError::invalid_input("Empty payload"));
    }

    let skus: Vec<&str> = payload.productos.iter().map(|p| p.sku.as_str()).collect();
    tracing::info!(client = ?client, count = skus.len(), skus = ?skus, "Received product batch");

    let records: Vec<Record> = payload.productos.into_iter().map(Record::from).collect();
    let summary = cache.apply_merge(&records).await?;

    if let Some(m) = metrics() {
        m.record_merge(summary.inserted, summary.updated, summary.total);
    }

    let flush = flush_status(cache.maybe_flush().await);
    if let Some(m) = metrics() {
        m.record_flush(flush_label(flush));
    }

    Ok(Json(IngestResponse {
        mensaje: INGEST_MESSAGE.to_string(),
        total_registros: summary.total,
        insertados: summary.inserted,
        actualizados: summary.updated,
        flush,
    }))
}

/// GET /productos - Current catalog table
#[utoipa::path(
    get,
    path = "/productos",
    tag = "Products",
    responses(
        (status = 200, description = "Current catalog", body = CatalogResponse),
        (status = 500, description = "Stored catalog is unreadable", body = ApiError),
        (status = 503, description = "Catalog storage unavailable", body = ApiError),
    ),
)]
pub async fn list_products(State(cache): State<Arc<ApiCache>>) -> ApiResult<Json<CatalogResponse>> {
    let table = cache.get_table().await?;
    Ok(Json(CatalogResponse::from(table)))
}

// ============================================================================
// HELPERS
// ============================================================================

/// A failed flush does not fail the request: the merge already happened and
/// the next trigger retries the write.
fn flush_status(result: catalog_core::CatalogResult<FlushOutcome>) -> FlushStatus {
    match result {
        Ok(FlushOutcome::Flushed { .. }) => FlushStatus::Flushed,
        Ok(FlushOutcome::Skipped(_)) => FlushStatus::Debounced,
        Err(e) => {
            tracing::warn!(error = %e, "Flush after merge failed, will retry on next trigger");
            FlushStatus::Failed
        }
    }
}

fn flush_label(status: FlushStatus) -> &'static str {
    match status {
        FlushStatus::Flushed => "flushed",
        FlushStatus::Debounced => "debounced",
        FlushStatus::Failed => "failed",
    }
}
