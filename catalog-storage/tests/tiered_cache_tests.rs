//! Integration tests for the tiered cache against real tier implementations:
//! a snapshot file in a temp directory and a scriptable in-memory object store.

use std::sync::Arc;
use std::time::Duration;

use catalog_storage::{codec, spawn_periodic_flush, LocalTier, RemoteTier};
use catalog_test_utils::assertions::{assert_field, assert_skus, assert_unique_keys};
use catalog_test_utils::fixtures::{cache_with, object_tier, product, snapshot_path, TEST_BUCKET, TEST_KEY};
use catalog_test_utils::*;
use tempfile::TempDir;
use tokio::sync::watch;

const INTERVAL: Duration = Duration::from_secs(15);

struct Harness {
    dir: TempDir,
    store: Arc<ScriptedObjectStore>,
    clock: Arc<ManualClock>,
    cache: TieredCache<FileTier, ObjectTier>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("TempDir creation should succeed");
        let store = Arc::new(ScriptedObjectStore::new());
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(dir.path(), store.clone(), clock.clone(), INTERVAL);
        Self {
            dir,
            store,
            clock,
            cache,
        }
    }

    fn local(&self) -> FileTier {
        FileTier::new(snapshot_path(self.dir.path()))
    }

    fn remote(&self) -> ObjectTier {
        object_tier(self.store.clone())
    }
}

// ============================================================================
// TIERED LOAD
// ============================================================================

#[tokio::test]
async fn test_empty_store_bootstrap() -> CatalogResult<()> {
    let h = Harness::new();

    let table = h.cache.get_table().await?;

    assert!(table.is_empty());
    assert!(h.cache.is_initialized());
    assert_eq!(h.store.get_calls(), 1);
    // Nothing is written until a flush.
    assert_eq!(h.local().load().await?, None);
    Ok(())
}

#[tokio::test]
async fn test_local_snapshot_wins_over_remote() -> CatalogResult<()> {
    let h = Harness::new();
    h.local().save(&Table::from_rows(vec![product("LOCAL", "1")])).await?;
    h.remote().save(&Table::from_rows(vec![product("REMOTE", "2")])).await?;
    let gets_before = h.store.get_calls();

    let table = h.cache.get_table().await?;

    assert_skus(&table, &["LOCAL"]);
    assert_eq!(h.store.get_calls(), gets_before);
    Ok(())
}

#[tokio::test]
async fn test_remote_load_populates_local_file() -> CatalogResult<()> {
    let h = Harness::new();
    let remote_table = Table::from_rows(vec![product("R1", "5"), product("R2", "6")]);
    h.remote().save(&remote_table).await?;

    let table = h.cache.get_table().await?;

    assert_eq!(table, remote_table);
    assert_eq!(h.local().load().await?, Some(remote_table));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_local_file_is_hard_error() -> CatalogResult<()> {
    let h = Harness::new();
    let path = snapshot_path(h.dir.path());
    std::fs::create_dir_all(path.parent().expect("snapshot path has a parent"))
        .expect("create_dir_all should succeed");
    std::fs::write(&path, b"definitely not a snapshot").expect("write should succeed");
    h.remote().save(&Table::from_rows(vec![product("R", "1")])).await?;

    let result = h.cache.get_table().await;

    assert!(matches!(
        result,
        Err(CatalogError::Storage(StorageError::Corrupt {
            tier: Tier::Local,
            ..
        }))
    ));
    assert!(!h.cache.is_initialized());
    Ok(())
}

#[tokio::test]
async fn test_corrupt_remote_object_is_hard_error() {
    let h = Harness::new();
    h.store.seed(TEST_BUCKET, TEST_KEY, b"{}".to_vec()).await;

    let result = h.cache.get_table().await;

    assert!(matches!(
        result,
        Err(CatalogError::Storage(StorageError::Corrupt {
            tier: Tier::Remote,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_remote_failure_is_hard_error_then_retries() -> CatalogResult<()> {
    let h = Harness::new();
    h.remote().save(&Table::from_rows(vec![product("R", "1")])).await?;
    h.store.fail_next_gets(1);

    let first = h.cache.get_table().await;
    assert!(matches!(
        first,
        Err(CatalogError::Storage(StorageError::Remote { .. }))
    ));
    assert!(!h.cache.is_initialized());

    let second = h.cache.get_table().await?;
    assert_skus(&second, &["R"]);
    Ok(())
}

#[tokio::test]
async fn test_out_of_band_changes_are_not_reloaded() -> CatalogResult<()> {
    let h = Harness::new();
    h.cache.get_table().await?;

    h.local().save(&Table::from_rows(vec![product("LATE", "1")])).await?;

    assert!(h.cache.get_table().await?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_loads_once() -> CatalogResult<()> {
    let h = Harness::new();
    let cache = Arc::new(h.cache);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .apply_merge(&[product(&format!("SKU-{}", i), "1")])
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("merge task should not panic")?;
    }

    assert_eq!(h.store.get_calls(), 1);
    let table = cache.get_table().await?;
    assert_eq!(table.len(), 16);
    assert_unique_keys(&table);
    Ok(())
}

// ============================================================================
// MERGE SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_first_batch_then_mixed_batch() -> CatalogResult<()> {
    let h = Harness::new();

    let first = h
        .cache
        .apply_merge(&[product("A", "10"), product("B", "20"), product("C", "30")])
        .await?;
    assert_eq!((first.total, first.inserted, first.updated), (3, 3, 0));

    let second = h
        .cache
        .apply_merge(&[product("B", "25"), product("D", "40")])
        .await?;
    assert_eq!((second.total, second.inserted, second.updated), (4, 1, 1));

    let table = h.cache.get_table().await?;
    assert_skus(&table, &["A", "B", "C", "D"]);
    assert_field(&table, "B", "Precio", "25");
    assert_field(&table, "A", "Precio", "10");
    Ok(())
}

#[tokio::test]
async fn test_merge_onto_remote_snapshot() -> CatalogResult<()> {
    let h = Harness::new();
    h.remote()
        .save(&Table::from_rows(vec![product("A", "1"), product("B", "2")]))
        .await?;

    let summary = h.cache.apply_merge(&[product("B", "3")]).await?;

    assert_eq!((summary.total, summary.inserted, summary.updated), (2, 0, 1));
    Ok(())
}

// ============================================================================
// FLUSHING
// ============================================================================

#[tokio::test]
async fn test_two_events_inside_interval_flush_once() -> CatalogResult<()> {
    let h = Harness::new();

    h.cache.apply_merge(&[product("A", "1")]).await?;
    assert!(h.cache.maybe_flush().await?.is_flushed());

    h.clock.advance(Duration::from_secs(3));
    h.cache.apply_merge(&[product("B", "2")]).await?;
    assert!(matches!(
        h.cache.maybe_flush().await?,
        FlushOutcome::Skipped(SkipReason::Debounced { .. })
    ));

    assert_eq!(h.store.put_calls(), 1);
    assert_skus(&h.remote().load().await?.unwrap_or_default(), &["A"]);
    Ok(())
}

#[tokio::test]
async fn test_two_events_outside_interval_flush_twice() -> CatalogResult<()> {
    let h = Harness::new();

    h.cache.apply_merge(&[product("A", "1")]).await?;
    h.cache.maybe_flush().await?;

    h.clock.advance(INTERVAL + Duration::from_secs(1));
    h.cache.apply_merge(&[product("B", "2")]).await?;
    assert_eq!(h.cache.maybe_flush().await?, FlushOutcome::Flushed { rows: 2 });

    assert_eq!(h.store.put_calls(), 2);
    let remote = h.remote().load().await?.unwrap_or_default();
    assert_skus(&remote, &["A", "B"]);
    assert_eq!(h.local().load().await?, Some(remote));
    Ok(())
}

#[tokio::test]
async fn test_flush_failure_retries_on_next_event() -> CatalogResult<()> {
    let h = Harness::new();
    h.cache.apply_merge(&[product("A", "1")]).await?;
    h.store.fail_next_puts(1);

    let failed = h.cache.maybe_flush().await;
    assert!(matches!(
        failed,
        Err(CatalogError::Storage(StorageError::Remote { .. }))
    ));
    // The merge itself stands.
    assert_eq!(h.cache.len(), 1);

    // No time passes; the failed attempt did not open a debounce window.
    h.cache.apply_merge(&[product("B", "2")]).await?;
    assert_eq!(h.cache.maybe_flush().await?, FlushOutcome::Flushed { rows: 2 });
    assert_skus(&h.remote().load().await?.unwrap_or_default(), &["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn test_force_flush_writes_inside_window() -> CatalogResult<()> {
    let h = Harness::new();
    h.cache.apply_merge(&[product("A", "1")]).await?;
    h.cache.maybe_flush().await?;
    h.cache.apply_merge(&[product("B", "2")]).await?;

    assert_eq!(h.cache.force_flush().await?, FlushOutcome::Flushed { rows: 2 });
    assert_eq!(h.store.put_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_snapshot_on_disk_is_decodable() -> CatalogResult<()> {
    let h = Harness::new();
    h.cache.apply_merge(&[product("A", "1")]).await?;
    h.cache.force_flush().await?;

    let bytes = std::fs::read(snapshot_path(h.dir.path())).expect("snapshot should exist");
    let table = codec::decode(&bytes, Tier::Local)?;
    assert_field(&table, "A", "Talla", "M");
    Ok(())
}

#[tokio::test]
async fn test_restart_reloads_rows_with_uneven_columns() -> CatalogResult<()> {
    let h = Harness::new();
    let legacy = product("A", "1").with("Temporada", "2023");
    h.cache
        .apply_merge(&[legacy, Record::new().with(KEY_FIELD, "B").with("Precio", "2")])
        .await?;
    // Full-row overwrite drops the legacy column for A.
    h.cache.apply_merge(&[product("A", "3")]).await?;
    h.cache.force_flush().await?;

    let in_memory = h.cache.get_table().await?;
    let reopened = cache_with(h.dir.path(), h.store.clone(), h.clock.clone(), INTERVAL);
    let reloaded = reopened.get_table().await?;

    assert_eq!(reloaded, in_memory);
    assert_eq!(reloaded.get("A").and_then(|r| r.get("Temporada")), None);
    assert_eq!(reloaded.get("B").and_then(|r| r.get("Talla")), None);
    Ok(())
}

#[tokio::test]
async fn test_status_tracks_unflushed_changes() -> CatalogResult<()> {
    let h = Harness::new();
    assert_eq!(h.cache.status(), CacheStatus::default());

    h.cache.apply_merge(&[product("A", "1")]).await?;
    assert_eq!(
        h.cache.status(),
        CacheStatus {
            initialized: true,
            rows: 1,
            dirty: true,
        }
    );

    h.cache.maybe_flush().await?;
    assert!(!h.cache.status().dirty);
    assert_eq!(
        h.cache.maybe_flush().await?,
        FlushOutcome::Skipped(SkipReason::Clean)
    );
    assert_eq!(h.store.put_calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_periodic_flush_runs_until_shutdown() -> CatalogResult<()> {
    let h = Harness::new();
    let store = h.store.clone();
    let cache = Arc::new(h.cache);
    cache.apply_merge(&[product("A", "1")]).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_periodic_flush(cache.clone(), Duration::from_secs(30), shutdown_rx);

    // File I/O runs on the blocking pool, so give the tick a few rounds to land.
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_secs(31)).await;
        if store.put_calls() > 0 {
            break;
        }
    }
    assert_eq!(store.put_calls(), 1);

    // Later ticks find the table clean.
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(store.put_calls(), 1);

    shutdown_tx.send(true).expect("flush task should be listening");
    handle.await.expect("flush task should stop cleanly");
    Ok(())
}
