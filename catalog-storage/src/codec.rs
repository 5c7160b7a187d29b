//! Columnar snapshot codec.
//!
//! A snapshot stores the table column by column: the ordered column names,
//! one value vector per column, the row count and a SHA-256 checksum of the
//! column payload. The document is serialized as JSON bytes. A row that has
//! no value for a column is stored as `null`, so decoding gives back exactly
//! the fields each row had.
//!
//! Decoding is strict. A snapshot that fails to parse, has ragged or repeated
//! columns, a checksum mismatch, no `sku` column or duplicate keys is reported
//! as [`StorageError::Corrupt`] and never silently treated as an empty table.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use catalog_core::{Record, StorageError, Table, Tier, KEY_FIELD};

/// Format tag written into every snapshot.
pub const SNAPSHOT_FORMAT: &str = "catalog-columnar/1";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format: String,
    rows: usize,
    columns: Vec<Column>,
    checksum: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Column {
    name: String,
    values: Vec<Option<String>>,
}

fn checksum(columns: &[Column]) -> String {
    let mut hasher = Sha256::new();
    for column in columns {
        hasher.update((column.name.len() as u64).to_le_bytes());
        hasher.update(column.name.as_bytes());
        for value in &column.values {
            match value {
                Some(value) => {
                    hasher.update([1u8]);
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
    }
    hex::encode(hasher.finalize())
}

/// Encode a table into snapshot bytes.
pub fn encode(table: &Table) -> Result<Vec<u8>, StorageError> {
    let columns: Vec<Column> = table
        .columns()
        .into_iter()
        .map(|name| {
            let values = table
                .iter()
                .map(|row| row.get(&name).map(str::to_string))
                .collect();
            Column { name, values }
        })
        .collect();

    let snapshot = Snapshot {
        format: SNAPSHOT_FORMAT.to_string(),
        rows: table.len(),
        checksum: checksum(&columns),
        columns,
    };

    serde_json::to_vec(&snapshot).map_err(|e| StorageError::Encode {
        reason: e.to_string(),
    })
}

/// Decode snapshot bytes read from `tier`.
pub fn decode(bytes: &[u8], tier: Tier) -> Result<Table, StorageError> {
    let corrupt = |reason: String| StorageError::Corrupt { tier, reason };

    let snapshot: Snapshot =
        serde_json::from_slice(bytes).map_err(|e| corrupt(format!("unreadable snapshot: {}", e)))?;

    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(corrupt(format!(
            "unsupported format '{}', expected '{}'",
            snapshot.format, SNAPSHOT_FORMAT
        )));
    }

    let mut names = HashSet::with_capacity(snapshot.columns.len());
    if let Some(column) = snapshot.columns.iter().find(|c| !names.insert(c.name.as_str())) {
        return Err(corrupt(format!("column '{}' appears more than once", column.name)));
    }

    if let Some(column) = snapshot
        .columns
        .iter()
        .find(|c| c.values.len() != snapshot.rows)
    {
        return Err(corrupt(format!(
            "column '{}' has {} values, expected {}",
            column.name,
            column.values.len(),
            snapshot.rows
        )));
    }

    let expected = checksum(&snapshot.columns);
    if expected != snapshot.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    if snapshot.rows == 0 {
        return Ok(Table::new());
    }

    if !snapshot.columns.iter().any(|c| c.name == KEY_FIELD) {
        return Err(corrupt(format!("missing key column '{}'", KEY_FIELD)));
    }

    let mut rows = vec![Record::new(); snapshot.rows];
    for column in snapshot.columns {
        for (row, value) in rows.iter_mut().zip(column.values) {
            if let Some(value) = value {
                row.set(column.name.clone(), value);
            }
        }
    }

    let table = Table::from_rows(rows);
    if !table.has_unique_keys() {
        return Err(corrupt("duplicate or empty sku values".to_string()));
    }
    Ok(table)
}
