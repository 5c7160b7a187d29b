//! Error types for catalog operations

use std::fmt;
use thiserror::Error;

/// Persistence tier an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Local snapshot file.
    Local,
    /// Remote object store.
    Remote,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Local => write!(f, "local"),
            Tier::Remote => write!(f, "remote"),
        }
    }
}

/// Client-side problems with an incoming batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty batch: at least one record is required")]
    EmptyBatch,

    #[error("Record at position {position} has an empty sku")]
    MissingKey { position: usize },
}

/// Storage layer errors.
///
/// A missing object is not an error: tiers report it as `Ok(None)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error on {tier} tier: {reason}")]
    Io { tier: Tier, reason: String },

    #[error("Remote object store request failed: {reason}")]
    Remote { reason: String },

    #[error("Corrupt snapshot in {tier} tier: {reason}")]
    Corrupt { tier: Tier, reason: String },

    #[error("Failed to encode snapshot: {reason}")]
    Encode { reason: String },
}

impl StorageError {
    /// Tier the error is attributed to, if any.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            StorageError::Io { tier, .. } | StorageError::Corrupt { tier, .. } => Some(*tier),
            StorageError::Remote { .. } => Some(Tier::Remote),
            StorageError::Encode { .. } => None,
        }
    }
}

/// Master error type for all catalog errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invariant violated: {reason}")]
    Invariant { reason: String },
}

impl CatalogError {
    /// True when the caller sent a bad request rather than the service failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CatalogError::Validation(_))
    }
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
