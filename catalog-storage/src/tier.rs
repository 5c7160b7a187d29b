//! Persistence tier traits and the local file tier.
//!
//! Both tiers expose the same two capabilities: load the whole table if it
//! exists, and overwrite the whole table. A missing snapshot is `Ok(None)`;
//! every other failure is an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use catalog_core::{StorageError, Table, Tier};

use crate::codec;

/// Cheap local tier (snapshot file on disk).
#[async_trait]
pub trait LocalTier: Send + Sync {
    /// Load the table, or `None` if no snapshot exists yet.
    async fn load(&self) -> Result<Option<Table>, StorageError>;

    /// Overwrite the stored snapshot with `table`.
    async fn save(&self, table: &Table) -> Result<(), StorageError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Durable remote tier (single object in an object store).
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// Load the table, or `None` if the object does not exist.
    ///
    /// Transport and server failures are errors, never `None`.
    async fn load(&self) -> Result<Option<Table>, StorageError>;

    /// Overwrite the stored object with `table`.
    async fn save(&self, table: &Table) -> Result<(), StorageError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

// ============================================================================
// FILE TIER
// ============================================================================

/// Local tier backed by a single snapshot file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct FileTier {
    path: PathBuf,
}

impl FileTier {
    /// Create a file tier for `path`. The parent directory is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, action: &str, err: std::io::Error) -> StorageError {
        StorageError::Io {
            tier: Tier::Local,
            reason: format!("{} {}: {}", action, self.path.display(), err),
        }
    }
}

#[async_trait]
impl LocalTier for FileTier {
    async fn load(&self) -> Result<Option<Table>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => codec::decode(&bytes, Tier::Local).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("failed to read", e)),
        }
    }

    async fn save(&self, table: &Table) -> Result<(), StorageError> {
        let bytes = codec::encode(table)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("failed to create directory for", e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| self.io_error("failed to write temp file for", e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error("failed to replace", e))?;

        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
