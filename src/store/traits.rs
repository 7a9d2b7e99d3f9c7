//! Permanent store trait definitions

use crate::merge::{DatasetMerger, MergeReport};
use crate::primitive::{ConsistencyError, Dataset, Primitive, PrimitiveId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Merge rejected: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Corrupt record for {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Bookkeeping entry written after a download landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub at: DateTime<Utc>,
    /// Ids the server reported absent during that download
    pub missing: BTreeSet<PrimitiveId>,
}

/// The caller's long-lived primitive store
///
/// Implementations must be thread-safe (Send + Sync): a fetch task looks
/// primitives up from a background task while the owner keeps using the store.
pub trait PermanentStore: Send + Sync {
    /// Look up a primitive by id
    fn lookup(&self, id: &PrimitiveId) -> StoreResult<Option<Primitive>>;

    /// Merge a dataset into the store.
    ///
    /// All or nothing: when this returns an error the store is unchanged.
    fn merge_from(&self, source: &Dataset, merger: &DatasetMerger) -> StoreResult<MergeReport>;

    /// Bookkeeping after a download has been merged
    fn on_post_download(&self, missing: &BTreeSet<PrimitiveId>) -> StoreResult<()>;

    /// Copy of the whole store content
    fn snapshot(&self) -> StoreResult<Dataset>;

    /// Downloads recorded so far, oldest first
    fn downloads(&self) -> StoreResult<Vec<DownloadRecord>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: PermanentStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StoreResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StoreResult<Self>;
}
