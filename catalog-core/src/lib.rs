//! Catalog Core - Records, Tables and the Merge Engine
//!
//! Pure data structures and the upsert logic every other crate builds on.
//! Nothing in this crate performs I/O.

pub mod error;
pub mod merge;
pub mod record;

pub use error::{CatalogError, CatalogResult, StorageError, Tier, ValidationError};
pub use merge::{dedupe_batch, merge, MergeOutcome};
pub use record::{Record, Table, KEY_FIELD, PRODUCT_FIELDS};
