//! Record merge engine.
//!
//! Pure upsert of an incoming batch into an existing [`Table`] keyed by `sku`.
//! No I/O and no shared state: the cache manager calls this inside its
//! exclusive section and swaps the result in.
//!
//! Rules:
//! - keys already in the table are updates and the whole row is replaced
//! - other keys are inserts, appended after the existing rows
//! - rows whose key is not in the batch are kept untouched, in place
//! - duplicate keys inside one batch: the last occurrence wins and the key
//!   keeps the position of its first occurrence

use std::collections::HashMap;

use crate::error::{CatalogError, CatalogResult, ValidationError};
use crate::record::{Record, Table};

/// Result of merging a batch into a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged table.
    pub table: Table,
    /// Number of keys that were not in the table before.
    pub inserted: usize,
    /// Number of keys whose row was overwritten.
    pub updated: usize,
}

impl MergeOutcome {
    /// Distinct keys in the batch that produced this outcome.
    pub fn affected(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Collapse a batch to one record per key, last occurrence winning.
///
/// Returns [`ValidationError::EmptyBatch`] for an empty batch and
/// [`ValidationError::MissingKey`] for a record without a `sku`.
pub fn dedupe_batch(incoming: &[Record]) -> Result<Vec<Record>, ValidationError> {
    if incoming.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(incoming.len());
    let mut batch: Vec<Record> = Vec::with_capacity(incoming.len());

    for (position, record) in incoming.iter().enumerate() {
        let sku = record.sku();
        if sku.is_empty() {
            return Err(ValidationError::MissingKey { position });
        }
        match positions.get(sku) {
            Some(&slot) => batch[slot] = record.clone(),
            None => {
                positions.insert(sku, batch.len());
                batch.push(record.clone());
            }
        }
    }

    Ok(batch)
}

/// Merge `incoming` into `existing`.
///
/// `existing` is not modified; the merged table is returned in the outcome.
pub fn merge(existing: &Table, incoming: &[Record]) -> CatalogResult<MergeOutcome> {
    let batch = dedupe_batch(incoming)?;

    let mut index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, r)| (r.sku().to_string(), i))
        .collect();
    let mut rows = existing.rows().to_vec();
    let mut inserted = 0;
    let mut updated = 0;

    for record in batch {
        match index.get(record.sku()) {
            Some(&i) => {
                rows[i] = record;
                updated += 1;
            }
            None => {
                index.insert(record.sku().to_string(), rows.len());
                rows.push(record);
                inserted += 1;
            }
        }
    }

    let table = Table::from_rows(rows);
    if !table.has_unique_keys() {
        return Err(CatalogError::Invariant {
            reason: format!(
                "merge produced duplicate or empty keys ({} rows, {} inserted, {} updated)",
                table.len(),
                inserted,
                updated
            ),
        });
    }

    Ok(MergeOutcome {
        table,
        inserted,
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(sku: &str, price: &str) -> Record {
        Record::new()
            .with("sku", sku)
            .with("Nombre_producto", format!("Producto {}", sku))
            .with("Precio", price)
    }

    #[test]
    fn test_first_batch_into_empty_table() -> CatalogResult<()> {
        let batch = vec![product("A", "1"), product("B", "2"), product("C", "3")];
        let outcome = merge(&Table::new(), &batch)?;

        assert_eq!(outcome.table.len(), 3);
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.table.skus().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        Ok(())
    }

    #[test]
    fn test_mixed_batch_updates_and_inserts() -> CatalogResult<()> {
        let existing = Table::from_rows(vec![product("A", "1"), product("B", "2")]);
        let batch = vec![product("B", "20"), product("C", "3")];

        let outcome = merge(&existing, &batch)?;

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.table.skus().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(outcome.table.get("B"), Some(&product("B", "20")));
        assert_eq!(outcome.table.get("A"), Some(&product("A", "1")));
        Ok(())
    }

    #[test]
    fn test_update_replaces_whole_row() -> CatalogResult<()> {
        let existing = Table::from_rows(vec![product("A", "1").with("Marca", "Acme")]);
        let batch = vec![Record::new().with("sku", "A").with("Precio", "5")];

        let outcome = merge(&existing, &batch)?;
        let row = outcome.table.get("A").ok_or_else(|| CatalogError::Invariant {
            reason: "row A missing".to_string(),
        })?;

        assert_eq!(row.get("Precio"), Some("5"));
        assert_eq!(row.get("Marca"), None);
        assert_eq!(row.get("Nombre_producto"), None);
        Ok(())
    }

    #[test]
    fn test_duplicate_keys_in_batch_last_wins() -> CatalogResult<()> {
        let batch = vec![product("A", "1"), product("B", "2"), product("A", "9")];
        let outcome = merge(&Table::new(), &batch)?;

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.affected(), 2);
        assert_eq!(outcome.table.skus().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(outcome.table.get("A").and_then(|r| r.get("Precio")), Some("9"));
        Ok(())
    }

    #[test]
    fn test_empty_batch_rejected() {
        let result = merge(&Table::new(), &[]);
        assert_eq!(
            result,
            Err(CatalogError::Validation(ValidationError::EmptyBatch))
        );
    }

    #[test]
    fn test_missing_key_rejected_with_position() {
        let batch = vec![product("A", "1"), Record::new().with("Precio", "3")];
        let result = merge(&Table::new(), &batch);
        assert_eq!(
            result,
            Err(CatalogError::Validation(ValidationError::MissingKey {
                position: 1
            }))
        );
    }

    #[test]
    fn test_reapply_same_batch_is_idempotent() -> CatalogResult<()> {
        let batch = vec![product("A", "1"), product("B", "2")];
        let first = merge(&Table::new(), &batch)?;
        let second = merge(&first.table, &batch)?;

        assert_eq!(second.table, first.table);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        Ok(())
    }

    #[test]
    fn test_corrupt_existing_table_is_invariant_violation() {
        let existing = Table::from_rows(vec![product("A", "1"), product("A", "2")]);
        let result = merge(&existing, &[product("B", "3")]);
        assert!(matches!(result, Err(CatalogError::Invariant { .. })));
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
