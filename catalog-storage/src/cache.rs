//! Tiered cache manager.
//!
//! Owns the in-memory catalog table. The table is loaded lazily from the
//! backing store on first use and then kept authoritative in memory; later
//! calls never reload it. One async mutex serializes initialization, merges
//! and flushes, and tier I/O is awaited while holding it.
//!
//! A [`CacheStatus`] snapshot is republished after every state change, so
//! readers such as health checks never wait on that mutex.

use std::sync::Arc;
use std::time::{Duration, Instant};

use catalog_core::{merge, CatalogError, CatalogResult, Record, Table};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::backing::BackingStore;
use crate::flush::{Clock, FlushOutcome, FlushScheduler, SkipReason, SystemClock, DEFAULT_FLUSH_INTERVAL};
use crate::tier::{LocalTier, RemoteTier};

/// Configuration for the tiered cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Minimum spacing between two debounced flushes.
    pub flush_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flush debounce interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}

/// Counts reported after a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Rows in the table after the merge.
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Point-in-time view of the cache, readable without taking the cache lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatus {
    /// Whether the table has been loaded.
    pub initialized: bool,
    /// Rows in the table, 0 before the first load.
    pub rows: usize,
    /// Whether the table changed since it was loaded or last flushed.
    pub dirty: bool,
}

#[derive(Debug)]
enum TableState {
    Uninitialized,
    Ready(Table),
}

#[derive(Debug)]
struct CacheState {
    table: TableState,
    last_flush: Option<Instant>,
    dirty: bool,
}

impl CacheState {
    fn status(&self) -> CacheStatus {
        match &self.table {
            TableState::Ready(table) => CacheStatus {
                initialized: true,
                rows: table.len(),
                dirty: self.dirty,
            },
            TableState::Uninitialized => CacheStatus::default(),
        }
    }
}

/// In-memory catalog table with lazy tiered loading and debounced flushing.
pub struct TieredCache<L, R> {
    store: BackingStore<L, R>,
    scheduler: FlushScheduler,
    state: Mutex<CacheState>,
    status: watch::Sender<CacheStatus>,
}

impl<L, R> TieredCache<L, R>
where
    L: LocalTier,
    R: RemoteTier,
{
    /// Create a cache over `store` using the system clock.
    pub fn new(store: BackingStore<L, R>, config: CacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock.
    pub fn with_clock(store: BackingStore<L, R>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            scheduler: FlushScheduler::new(config.flush_interval, clock),
            state: Mutex::new(CacheState {
                table: TableState::Uninitialized,
                last_flush: None,
                dirty: false,
            }),
            status: watch::Sender::new(CacheStatus::default()),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &BackingStore<L, R> {
        &self.store
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    fn publish(&self, state: &CacheState) {
        self.status.send_replace(state.status());
    }

    /// Load the table if this is the first use. A failed load leaves the
    /// state uninitialized so the next caller retries.
    async fn ensure_loaded<'a>(&self, state: &'a mut CacheState) -> CatalogResult<&'a mut Table> {
        if matches!(state.table, TableState::Uninitialized) {
            let (table, source) = self.store.load().await.map_err(|e| {
                warn!(error = %e, "Failed to load catalog table");
                CatalogError::from(e)
            })?;
            info!(source = %source, rows = table.len(), "Catalog table initialized");
            state.table = TableState::Ready(table);
            state.dirty = false;
            self.publish(state);
        }

        match &mut state.table {
            TableState::Ready(table) => Ok(table),
            TableState::Uninitialized => Err(CatalogError::Invariant {
                reason: "table state not ready after load".to_string(),
            }),
        }
    }

    /// Current table, loading it on first call.
    pub async fn get_table(&self) -> CatalogResult<Table> {
        let mut state = self.state.lock().await;
        let table = self.ensure_loaded(&mut state).await?;
        Ok(table.clone())
    }

    /// Upsert `incoming` into the table.
    ///
    /// The merged table replaces the current one only if the merge succeeds.
    pub async fn apply_merge(&self, incoming: &[Record]) -> CatalogResult<MergeSummary> {
        let mut state = self.state.lock().await;
        let table = self.ensure_loaded(&mut state).await?;

        let outcome = merge(table, incoming).map_err(|e| {
            if e.is_client_error() {
                debug!(error = %e, "Rejected batch");
            } else {
                warn!(error = %e, "Merge failed");
            }
            e
        })?;
        let summary = MergeSummary {
            total: outcome.table.len(),
            inserted: outcome.inserted,
            updated: outcome.updated,
        };
        let affected = outcome.affected();
        *table = outcome.table;
        state.dirty = true;
        self.publish(&state);

        debug!(
            total = summary.total,
            inserted = summary.inserted,
            updated = summary.updated,
            affected,
            "Merged batch into catalog table"
        );
        Ok(summary)
    }

    /// Flush both tiers unless the table was never loaded, has not changed
    /// since the last load or flush, or the last flush is more recent than the
    /// configured interval.
    ///
    /// On failure the flush timestamp and the dirty flag are left unchanged,
    /// so the next call retries immediately.
    pub async fn maybe_flush(&self) -> CatalogResult<FlushOutcome> {
        let mut state = self.state.lock().await;
        let now = self.scheduler.now();

        if matches!(state.table, TableState::Ready(_)) {
            if !state.dirty {
                debug!("Flush skipped, catalog table unchanged");
                return Ok(FlushOutcome::Skipped(SkipReason::Clean));
            }
            if let Some(remaining) = self.scheduler.remaining(state.last_flush, now) {
                debug!(remaining_ms = remaining.as_millis() as u64, "Flush debounced");
                return Ok(FlushOutcome::Skipped(SkipReason::Debounced { remaining }));
            }
        }

        self.flush_locked(&mut state, now).await
    }

    /// Flush both tiers regardless of the debounce window or the dirty flag.
    pub async fn force_flush(&self) -> CatalogResult<FlushOutcome> {
        let mut state = self.state.lock().await;
        let now = self.scheduler.now();
        self.flush_locked(&mut state, now).await
    }

    async fn flush_locked(&self, state: &mut CacheState, now: Instant) -> CatalogResult<FlushOutcome> {
        let TableState::Ready(table) = &state.table else {
            debug!("Flush skipped, catalog table not initialized");
            return Ok(FlushOutcome::Skipped(SkipReason::NotInitialized));
        };

        let rows = table.len();
        if let Err(e) = self.store.save(table).await {
            warn!(error = %e, tier = ?e.tier(), rows, "Catalog flush failed");
            return Err(e.into());
        }

        state.last_flush = Some(now);
        state.dirty = false;
        self.publish(state);
        info!(rows, "Catalog table flushed to local and remote tiers");
        Ok(FlushOutcome::Flushed { rows })
    }

    /// Latest published status. Never waits on the cache lock, so it stays
    /// responsive while a load or flush is in flight.
    pub fn status(&self) -> CacheStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<CacheStatus> {
        self.status.subscribe()
    }

    /// Whether the table has been loaded.
    pub fn is_initialized(&self) -> bool {
        self.status().initialized
    }

    /// Rows in the table, or 0 if it has not been loaded yet.
    pub fn len(&self) -> usize {
        self.status().rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L, R> std::fmt::Debug for TieredCache<L, R>
where
    L: LocalTier,
    R: RemoteTier,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("local", &self.store.local().describe())
            .field("remote", &self.store.remote().describe())
            .field("flush_interval", &self.scheduler.interval())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_core::{StorageError, Tier, ValidationError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug)]
    struct StepClock(StdMutex<Instant>);

    impl StepClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(StdMutex::new(Instant::now())))
        }
        fn advance(&self, by: Duration) {
            *self.0.lock().expect("lock") += by;
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Instant {
            *self.0.lock().expect("lock")
        }
    }

    #[derive(Default)]
    struct CountingTier {
        table: StdMutex<Option<Table>>,
        loads: AtomicUsize,
        saves: AtomicUsize,
        fail_saves: AtomicUsize,
    }

    impl CountingTier {
        fn do_save(&self, tier: Tier, table: &Table) -> Result<(), StorageError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let pending = self.fail_saves.load(Ordering::SeqCst);
            if pending > 0 {
                self.fail_saves.store(pending - 1, Ordering::SeqCst);
                return Err(StorageError::Io {
                    tier,
                    reason: "disk full".to_string(),
                });
            }
            *self.table.lock().expect("lock") = Some(table.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl LocalTier for Arc<CountingTier> {
        async fn load(&self) -> Result<Option<Table>, StorageError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.table.lock().expect("lock").clone())
        }
        async fn save(&self, table: &Table) -> Result<(), StorageError> {
            self.do_save(Tier::Local, table)
        }
        fn describe(&self) -> String {
            "counting-local".to_string()
        }
    }

    #[async_trait]
    impl RemoteTier for Arc<CountingTier> {
        async fn load(&self) -> Result<Option<Table>, StorageError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.table.lock().expect("lock").clone())
        }
        async fn save(&self, table: &Table) -> Result<(), StorageError> {
            self.do_save(Tier::Remote, table)
        }
        fn describe(&self) -> String {
            "counting-remote".to_string()
        }
    }

    type TestCache = TieredCache<Arc<CountingTier>, Arc<CountingTier>>;

    fn setup() -> (TestCache, Arc<CountingTier>, Arc<CountingTier>, Arc<StepClock>) {
        let local = Arc::new(CountingTier::default());
        let remote = Arc::new(CountingTier::default());
        let clock = StepClock::new();
        let cache = TieredCache::with_clock(
            BackingStore::new(local.clone(), remote.clone()),
            CacheConfig::new().with_flush_interval(Duration::from_secs(15)),
            clock.clone(),
        );
        (cache, local, remote, clock)
    }

    fn rec(sku: &str, price: &str) -> Record {
        Record::new().with("sku", sku).with("Precio", price)
    }

    #[tokio::test]
    async fn test_lazy_load_happens_once() -> CatalogResult<()> {
        let (cache, local, _, _) = setup();
        assert!(!cache.is_initialized());

        cache.get_table().await?;
        cache.get_table().await?;

        assert!(cache.is_initialized());
        assert_eq!(local.loads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_reports_counts() -> CatalogResult<()> {
        let (cache, _, _, _) = setup();
        let first = cache.apply_merge(&[rec("A", "1"), rec("B", "2")]).await?;
        assert_eq!(
            first,
            MergeSummary {
                total: 2,
                inserted: 2,
                updated: 0
            }
        );

        let second = cache.apply_merge(&[rec("B", "3"), rec("C", "4")]).await?;
        assert_eq!(
            second,
            MergeSummary {
                total: 3,
                inserted: 1,
                updated: 1
            }
        );
        assert_eq!(cache.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_batch_leaves_table_untouched() -> CatalogResult<()> {
        let (cache, _, _, _) = setup();
        cache.apply_merge(&[rec("A", "1")]).await?;

        let result = cache.apply_merge(&[]).await;
        assert_eq!(
            result,
            Err(CatalogError::Validation(ValidationError::EmptyBatch))
        );
        assert_eq!(cache.get_table().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_flush_before_init_is_skipped() -> CatalogResult<()> {
        let (cache, local, _, _) = setup();
        assert_eq!(
            cache.maybe_flush().await?,
            FlushOutcome::Skipped(SkipReason::NotInitialized)
        );
        assert_eq!(
            cache.force_flush().await?,
            FlushOutcome::Skipped(SkipReason::NotInitialized)
        );
        assert_eq!(local.saves.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_debounce_and_retry_after_failure() -> CatalogResult<()> {
        let (cache, local, remote, clock) = setup();
        cache.apply_merge(&[rec("A", "1")]).await?;

        assert_eq!(cache.maybe_flush().await?, FlushOutcome::Flushed { rows: 1 });
        clock.advance(Duration::from_secs(5));
        assert!(matches!(
            cache.maybe_flush().await?,
            FlushOutcome::Skipped(SkipReason::Debounced { .. })
        ));
        assert_eq!(remote.saves.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(20));
        cache.apply_merge(&[rec("B", "2")]).await?;
        local.fail_saves.store(1, Ordering::SeqCst);
        assert!(cache.maybe_flush().await.is_err());
        assert_eq!(remote.saves.load(Ordering::SeqCst), 1);

        // Failure did not advance the timestamp.
        assert!(cache.maybe_flush().await?.is_flushed());
        assert_eq!(remote.saves.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_clean_table_is_not_rewritten() -> CatalogResult<()> {
        let (cache, local, remote, clock) = setup();
        cache.get_table().await?;
        assert!(!cache.status().dirty);

        // Loaded but never changed.
        assert_eq!(cache.maybe_flush().await?, FlushOutcome::Skipped(SkipReason::Clean));

        cache.apply_merge(&[rec("A", "1")]).await?;
        assert!(cache.status().dirty);
        assert!(cache.maybe_flush().await?.is_flushed());
        assert!(!cache.status().dirty);

        // Idle intervals after the flush write nothing.
        for _ in 0..3 {
            clock.advance(Duration::from_secs(60));
            assert_eq!(cache.maybe_flush().await?, FlushOutcome::Skipped(SkipReason::Clean));
        }
        assert_eq!(local.saves.load(Ordering::SeqCst), 1);
        assert_eq!(remote.saves.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_flush_stays_dirty() -> CatalogResult<()> {
        let (cache, _, remote, _) = setup();
        cache.apply_merge(&[rec("A", "1")]).await?;
        remote.fail_saves.store(1, Ordering::SeqCst);

        assert!(cache.maybe_flush().await.is_err());
        assert!(cache.status().dirty);
        assert!(cache.maybe_flush().await?.is_flushed());
        assert!(!cache.status().dirty);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_readable_while_lock_held() -> CatalogResult<()> {
        let (cache, _, _, _) = setup();
        cache.apply_merge(&[rec("A", "1"), rec("B", "2")]).await?;

        // Stands in for a slow load or flush holding the lock.
        let _guard = cache.state.lock().await;
        assert_eq!(
            cache.status(),
            CacheStatus {
                initialized: true,
                rows: 2,
                dirty: true,
            }
        );
        assert_eq!(cache.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_subscribers_see_changes() -> CatalogResult<()> {
        let (cache, _, _, _) = setup();
        let mut rx = cache.subscribe_status();
        assert_eq!(*rx.borrow_and_update(), CacheStatus::default());

        cache.apply_merge(&[rec("A", "1")]).await?;
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().rows, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_force_flush_ignores_debounce() -> CatalogResult<()> {
        let (cache, _, remote, _) = setup();
        cache.apply_merge(&[rec("A", "1")]).await?;

        assert!(cache.maybe_flush().await?.is_flushed());
        assert!(cache.force_flush().await?.is_flushed());
        assert_eq!(remote.saves.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
