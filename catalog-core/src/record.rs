//! Record and Table types.
//!
//! A [`Record`] is a string-valued row keyed by its `sku` field. A [`Table`]
//! is an ordered collection of records, unique by `sku`. Typed product fields
//! (price, stock) are stringified before they enter a record, so the table is
//! a uniform text table rather than a typed relation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Name of the unique key field.
pub const KEY_FIELD: &str = "sku";

/// Canonical product columns, in storage order.
pub const PRODUCT_FIELDS: [&str; 13] = [
    "sku",
    "Referencia_del_producto",
    "Nombre_producto",
    "Descripcion_producto",
    "Keywords",
    "MetaTagDescription",
    "Categoria",
    "Marca",
    "Link",
    "Talla",
    "Imagen_url",
    "Precio",
    "Inventario",
];

// ============================================================================
// RECORD
// ============================================================================

/// A single product row: field name to text value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(field, value)` pairs. Later pairs overwrite earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The record's key. Empty when the `sku` field is absent.
    pub fn sku(&self) -> &str {
        self.get(KEY_FIELD).unwrap_or("")
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Set a field value, returning the previous one.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(field.into(), value.into())
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Iterate over `(field, value)` pairs in field-name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Names of the fields present in this record.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// Ordered collection of records, unique by `sku`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Record>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap rows as a table without checking key uniqueness.
    ///
    /// Callers that cannot guarantee uniqueness must check [`Table::has_unique_keys`].
    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in table order.
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Iterate over rows in table order.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    /// Consume the table, returning its rows.
    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// Look up a row by key.
    pub fn get(&self, sku: &str) -> Option<&Record> {
        self.rows.iter().find(|r| r.sku() == sku)
    }

    /// True when a row with this key exists.
    pub fn contains(&self, sku: &str) -> bool {
        self.get(sku).is_some()
    }

    /// Keys in table order.
    pub fn skus(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(Record::sku)
    }

    /// Every `sku` is non-empty and appears once.
    pub fn has_unique_keys(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows
            .iter()
            .all(|r| !r.sku().is_empty() && seen.insert(r.sku()))
    }

    /// Column names across all rows.
    ///
    /// Canonical product columns come first in [`PRODUCT_FIELDS`] order, followed
    /// by any extra columns in name order. An empty table has no columns.
    pub fn columns(&self) -> Vec<String> {
        let present: BTreeSet<&str> = self.rows.iter().flat_map(Record::field_names).collect();
        let mut columns: Vec<String> = PRODUCT_FIELDS
            .iter()
            .filter(|f| present.contains(*f))
            .map(|f| f.to_string())
            .collect();
        columns.extend(
            present
                .iter()
                .filter(|f| !PRODUCT_FIELDS.contains(f))
                .map(|f| f.to_string()),
        );
        columns
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sku_and_fields() {
        let record = Record::new().with("sku", "A-1").with("Precio", "10.5");
        assert_eq!(record.sku(), "A-1");
        assert_eq!(record.get("Precio"), Some("10.5"));
        assert_eq!(record.len(), 2);

        let keyless = Record::from_pairs([("Talla", "M")]);
        assert_eq!(keyless.sku(), "");
    }

    #[test]
    fn test_table_unique_keys() {
        let a = Record::new().with("sku", "A");
        let b = Record::new().with("sku", "B");

        assert!(Table::from_rows(vec![a.clone(), b.clone()]).has_unique_keys());
        assert!(!Table::from_rows(vec![a.clone(), a.clone()]).has_unique_keys());
        assert!(!Table::from_rows(vec![Record::new()]).has_unique_keys());
        assert!(Table::new().has_unique_keys());
    }

    #[test]
    fn test_columns_canonical_order_then_extras() {
        let table = Table::from_rows(vec![
            Record::new().with("Precio", "1").with("sku", "A").with("zeta", "z"),
            Record::new().with("sku", "B").with("Talla", "M").with("alpha", "a"),
        ]);
        assert_eq!(
            table.columns(),
            vec!["sku", "Talla", "Precio", "alpha", "zeta"]
        );
        assert!(Table::new().columns().is_empty());
    }

    #[test]
    fn test_record_serializes_as_flat_map() -> Result<(), serde_json::Error> {
        let record = Record::new().with("sku", "A").with("Marca", "Acme");
        let json = serde_json::to_string(&record)?;
        assert_eq!(json, r#"{"Marca":"Acme","sku":"A"}"#);
        Ok(())
    }
}
