//! Catalog Test Utilities
//!
//! Shared test infrastructure for the catalog workspace:
//! - Proptest generators for records and batches
//! - A scriptable object store and a manual clock
//! - Fixtures for products and ready-made caches
//! - Assertions for catalog tables

pub use catalog_core::{
    CatalogError, CatalogResult, Record, StorageError, Table, Tier, ValidationError, KEY_FIELD,
    PRODUCT_FIELDS,
};
pub use catalog_storage::{
    BackingStore, CacheConfig, CacheStatus, Clock, FileTier, FlushOutcome, InMemoryObjectStore, ObjectStore,
    ObjectTier, SkipReason, TieredCache,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

// ============================================================================
// MOCKS
// ============================================================================

/// Object store that wraps [`InMemoryObjectStore`] and can be told to fail the
/// next N reads or writes. Counts every call, failed or not.
#[derive(Debug, Default)]
pub struct ScriptedObjectStore {
    inner: InMemoryObjectStore,
    failing_gets: AtomicUsize,
    failing_puts: AtomicUsize,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl ScriptedObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls to `get` with a remote error.
    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` calls to `put` with a remote error.
    pub fn fail_next_puts(&self, n: usize) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Raw object bytes, bypassing the failure script.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.inner.get(bucket, key).await.ok().flatten()
    }

    /// Store raw bytes, bypassing the failure script and call counters.
    pub async fn seed(&self, bucket: &str, key: &str, body: Vec<u8>) {
        // InMemoryObjectStore::put is infallible
        let _ = self.inner.put(bucket, key, body).await;
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectStore for ScriptedObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_gets) {
            return Err(StorageError::Remote {
                reason: format!("scripted GET failure for {}/{}", bucket, key),
            });
        }
        self.inner.get(bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_puts) {
            return Err(StorageError::Remote {
                reason: format!("scripted PUT failure for {}/{}", bucket, key),
            });
        }
        self.inner.put(bucket, key, body).await
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog records.

    use super::*;
    use proptest::prelude::*;

    /// SKU drawn from a small pool so batches collide with each other and
    /// with existing tables.
    pub fn arb_sku() -> impl Strategy<Value = String> {
        "[A-F][0-9]"
    }

    /// Record with a valid sku and a few product fields.
    pub fn arb_record() -> impl Strategy<Value = Record> {
        (
            arb_sku(),
            "[a-z]{1,8}",
            0u32..100_000,
            0u32..500,
            prop::option::of("[A-Za-z ]{0,12}"),
        )
            .prop_map(|(sku, name, cents, stock, brand)| {
                let mut record = Record::new()
                    .with(KEY_FIELD, sku)
                    .with("Nombre_producto", name)
                    .with("Precio", format!("{}.{:02}", cents / 100, cents % 100))
                    .with("Inventario", stock.to_string());
                if let Some(brand) = brand {
                    record.set("Marca", brand);
                }
                record
            })
    }

    /// Non-empty batch, possibly with repeated skus.
    pub fn arb_batch() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(arb_record(), 1..12)
    }

    /// Table with unique keys (may be empty).
    pub fn arb_table() -> impl Strategy<Value = Table> {
        prop::collection::vec(arb_record(), 0..20).prop_map(|records| {
            let mut seen = std::collections::HashSet::new();
            Table::from_rows(
                records
                    .into_iter()
                    .filter(|r| seen.insert(r.sku().to_string()))
                    .collect(),
            )
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and caches for common scenarios.

    use super::*;
    use std::path::Path;

    pub const TEST_BUCKET: &str = "catalog-test";
    pub const TEST_KEY: &str = "catalog/data_endpoint/datos_endpoint.snapshot";

    /// Product record carrying every catalog field.
    pub fn product(sku: &str, price: &str) -> Record {
        Record::new()
            .with(KEY_FIELD, sku)
            .with("Referencia_del_producto", format!("REF-{}", sku))
            .with("Nombre_producto", format!("Producto {}", sku))
            .with("Descripcion_producto", "")
            .with("Keywords", "")
            .with("MetaTagDescription", "")
            .with("Talla", "M")
            .with("Precio", price)
            .with("Inventario", "10")
            .with("Categoria", "Ropa")
            .with("Marca", "")
            .with("Link", "")
            .with("Imagen_url", "")
    }

    /// Table built from `records` in order.
    pub fn table_of(records: Vec<Record>) -> Table {
        Table::from_rows(records)
    }

    /// Snapshot file path inside `dir`.
    pub fn snapshot_path(dir: &Path) -> std::path::PathBuf {
        dir.join("data").join("datos_endpoint.snapshot")
    }

    /// Remote tier over `store` at the test bucket and key.
    pub fn object_tier(store: Arc<dyn ObjectStore>) -> ObjectTier {
        ObjectTier::new(store, TEST_BUCKET, TEST_KEY)
    }

    /// Cache over a file tier in `dir` and `store`, driven by `clock`.
    pub fn cache_with(
        dir: &Path,
        store: Arc<dyn ObjectStore>,
        clock: Arc<ManualClock>,
        flush_interval: Duration,
    ) -> TieredCache<FileTier, ObjectTier> {
        TieredCache::with_clock(
            BackingStore::new(FileTier::new(snapshot_path(dir)), object_tier(store)),
            CacheConfig::new().with_flush_interval(flush_interval),
            clock,
        )
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Catalog-specific assertions.

    use super::*;

    /// Assert that no sku appears twice and none is empty.
    pub fn assert_unique_keys(table: &Table) {
        let mut seen = std::collections::HashSet::new();
        for sku in table.skus() {
            assert!(!sku.is_empty(), "table contains a row with an empty sku");
            assert!(seen.insert(sku), "duplicate sku '{}' in table", sku);
        }
    }

    /// Assert the table's keys, in order.
    pub fn assert_skus(table: &Table, expected: &[&str]) {
        let actual: Vec<&str> = table.skus().collect();
        assert_eq!(actual, expected, "unexpected sku order");
    }

    /// Assert a field value of the row with `sku`.
    pub fn assert_field(table: &Table, sku: &str, field: &str, expected: &str) {
        let row = table
            .get(sku)
            .unwrap_or_else(|| panic!("sku '{}' missing from table", sku));
        assert_eq!(row.get(field), Some(expected), "field {} of sku {}", field, sku);
    }
}
