//! Backing store adapter combining the local and remote tiers.
//!
//! Load order is local, then remote. A table fetched from the remote tier is
//! written back to the local tier so the next process start finds it locally.
//! Saves go local first, then remote, and stop at the first failure.

use catalog_core::{StorageError, Table};
use tracing::{debug, info, warn};

use crate::tier::{LocalTier, RemoteTier};

/// Where a loaded table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Found in the local tier.
    Local,
    /// Found in the remote tier (and copied to the local tier).
    Remote,
    /// Neither tier had a snapshot.
    Empty,
}

impl std::fmt::Display for LoadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadSource::Local => write!(f, "local"),
            LoadSource::Remote => write!(f, "remote"),
            LoadSource::Empty => write!(f, "empty"),
        }
    }
}

/// Local + remote persistence pair.
#[derive(Debug)]
pub struct BackingStore<L, R> {
    local: L,
    remote: R,
}

impl<L, R> BackingStore<L, R>
where
    L: LocalTier,
    R: RemoteTier,
{
    /// Combine a local and a remote tier.
    pub fn new(local: L, remote: R) -> Self {
        Self { local, remote }
    }

    /// The local tier.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// The remote tier.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Load the persisted table.
    ///
    /// Remote not-found yields an empty table. Any other remote failure, and a
    /// corrupt snapshot in either tier, is returned as an error.
    pub async fn load(&self) -> Result<(Table, LoadSource), StorageError> {
        if let Some(table) = self.local.load().await? {
            debug!(path = %self.local.describe(), rows = table.len(), "Loaded table from local tier");
            return Ok((table, LoadSource::Local));
        }

        match self.remote.load().await? {
            Some(table) => {
                info!(
                    location = %self.remote.describe(),
                    rows = table.len(),
                    "Loaded table from remote tier"
                );
                if let Err(e) = self.local.save(&table).await {
                    warn!(
                        path = %self.local.describe(),
                        error = %e,
                        "Failed to copy remote table to local tier"
                    );
                }
                Ok((table, LoadSource::Remote))
            }
            None => {
                info!(
                    location = %self.remote.describe(),
                    "No snapshot in either tier, starting with an empty table"
                );
                Ok((Table::new(), LoadSource::Empty))
            }
        }
    }

    /// Write `table` to the local tier, then the remote tier.
    pub async fn save(&self, table: &Table) -> Result<(), StorageError> {
        self.local.save(table).await?;
        self.remote.save(table).await?;
        debug!(
            path = %self.local.describe(),
            location = %self.remote.describe(),
            rows = table.len(),
            "Saved table to both tiers"
        );
        Ok(())
    }
}
