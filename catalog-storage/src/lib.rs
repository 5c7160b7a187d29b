//! Catalog Storage - Tiered Persistence for the Catalog Table
//!
//! This crate keeps the catalog table in memory and persists it to two tiers:
//!
//! - **Local tier**: a snapshot file on disk, cheap to read at startup
//! - **Remote tier**: one object in an S3-compatible object store, the
//!   durable copy shared across deployments
//!
//! # Architecture
//!
//! ```text
//!  apply_merge / get_table
//!           │
//!  ┌────────▼────────┐     maybe_flush / force_flush
//!  │   TieredCache   │◄──────────────── FlushScheduler
//!  └────────┬────────┘
//!           │ load (first use) / save
//!  ┌────────▼────────┐
//!  │  BackingStore   │
//!  └───┬─────────┬───┘
//!      │         │
//!  FileTier   ObjectTier ──► ObjectStore (S3 / HTTP gateway / in-memory)
//! ```

pub mod backing;
pub mod cache;
pub mod codec;
pub mod flush;
pub mod object_store;
pub mod s3;
pub mod tier;

pub use backing::{BackingStore, LoadSource};
pub use cache::{CacheConfig, CacheStatus, MergeSummary, TieredCache};
pub use flush::{
    spawn_periodic_flush, Clock, FlushOutcome, FlushScheduler, SkipReason, SystemClock,
    DEFAULT_FLUSH_INTERVAL,
};
pub use object_store::{
    HttpObjectStore, HttpObjectStoreConfig, InMemoryObjectStore, ObjectStore, ObjectTier,
};
pub use s3::{S3ObjectStore, S3ObjectStoreConfig};
pub use tier::{FileTier, LocalTier, RemoteTier};
