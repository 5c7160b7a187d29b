//! Request and response types for the HTTP surface.
//!
//! Field names on the wire keep the catalog's own column names
//! (`Nombre_producto`, `Precio`, ...) so existing feeds post unchanged.

use catalog_core::{Record, Table, KEY_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

// ============================================================================
// PRODUCT PAYLOAD
// ============================================================================

/// One product as posted by a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Producto {
    pub sku: String,
    #[serde(rename = "Referencia_del_producto")]
    pub referencia_del_producto: String,
    #[serde(rename = "Nombre_producto")]
    pub nombre_producto: String,
    #[serde(rename = "Descripcion_producto", default)]
    pub descripcion_producto: Option<String>,
    #[serde(rename = "Keywords", default)]
    pub keywords: Option<String>,
    #[serde(rename = "MetaTagDescription", default)]
    pub meta_tag_description: Option<String>,
    #[serde(rename = "Categoria", default)]
    pub categoria: Option<String>,
    #[serde(rename = "Marca", default)]
    pub marca: Option<String>,
    #[serde(rename = "Link", default)]
    pub link: Option<String>,
    #[serde(rename = "Talla")]
    pub talla: String,
    #[serde(rename = "Imagen_url", default)]
    pub imagen_url: Option<String>,
    #[serde(rename = "Precio")]
    pub precio: f64,
    #[serde(rename = "Inventario")]
    pub inventario: i64,
}

/// Body of `POST /productos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayloadProductos {
    pub productos: Vec<Producto>,
}

/// Render a price the way the catalog has always stored it: integral values
/// keep one decimal (`20.0`), others use the shortest round-trip form.
pub fn format_price(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

impl From<Producto> for Record {
    fn from(p: Producto) -> Self {
        let text = |v: Option<String>| v.unwrap_or_default();
        Record::new()
            .with(KEY_FIELD, p.sku)
            .with("Referencia_del_producto", p.referencia_del_producto)
            .with("Nombre_producto", p.nombre_producto)
            .with("Descripcion_producto", text(p.descripcion_producto))
            .with("Keywords", text(p.keywords))
            .with("MetaTagDescription", text(p.meta_tag_description))
            .with("Categoria", text(p.categoria))
            .with("Marca", text(p.marca))
            .with("Link", text(p.link))
            .with("Talla", p.talla)
            .with("Imagen_url", text(p.imagen_url))
            .with("Precio", format_price(p.precio))
            .with("Inventario", p.inventario.to_string())
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Whether the post-merge flush wrote anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlushStatus {
    /// Both tiers were written.
    Flushed,
    /// Skipped because the previous flush is too recent.
    Debounced,
    /// The write failed; it is retried on the next trigger.
    Failed,
}

/// Body returned by `POST /productos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub mensaje: String,
    pub total_registros: usize,
    pub insertados: usize,
    pub actualizados: usize,
    pub flush: FlushStatus,
}

/// Body returned by `GET /productos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CatalogResponse {
    pub total_registros: usize,
    #[schema(value_type = Vec<Object>)]
    pub productos: Vec<BTreeMap<String, String>>,
}

impl From<Table> for CatalogResponse {
    fn from(table: Table) -> Self {
        let total_registros = table.len();
        let productos = table
            .into_rows()
            .into_iter()
            .map(|row| {
                row.fields()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect();
        Self {
            total_registros,
            productos,
        }
    }
}
