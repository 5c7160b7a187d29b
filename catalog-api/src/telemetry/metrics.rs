//! Prometheus Metrics Definitions
//!
//! Defines the catalog service metrics and the /metrics endpoint for
//! Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<CatalogMetrics>> = Lazy::new(CatalogMetrics::new);

/// Registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static CatalogMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all catalog service metrics.
#[derive(Clone)]
pub struct CatalogMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Merged records - labels: kind (inserted/updated)
    pub merge_records_total: CounterVec,

    /// Flush attempts - labels: status (flushed/debounced/failed)
    pub flush_total: CounterVec,

    /// Rows in the in-memory catalog table
    pub table_rows: Gauge,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl CatalogMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "catalog_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "catalog_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            merge_records_total: register_counter_vec!(
                "catalog_merge_records_total",
                "Records merged into the catalog table",
                &["kind"]
            )
            .map_err(|e| registration_error("merge_records_total", e))?,

            flush_total: register_counter_vec!(
                "catalog_flush_total",
                "Flush attempts by outcome",
                &["status"]
            )
            .map_err(|e| registration_error("flush_total", e))?,

            table_rows: register_gauge!(
                "catalog_table_rows",
                "Rows in the in-memory catalog table"
            )
            .map_err(|e| registration_error("table_rows", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record the result of a merge.
    pub fn record_merge(&self, inserted: usize, updated: usize, total: usize) {
        self.merge_records_total
            .with_label_values(&["inserted"])
            .inc_by(inserted as f64);
        self.merge_records_total
            .with_label_values(&["updated"])
            .inc_by(updated as f64);
        self.table_rows.set(total as f64);
    }

    /// Record a flush attempt.
    pub fn record_flush(&self, status: &str) {
        self.flush_total.with_label_values(&[status]).inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Register on first scrape even if nothing has been recorded yet.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
