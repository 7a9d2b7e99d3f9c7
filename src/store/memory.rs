//! In-memory permanent store

use super::traits::{DownloadRecord, PermanentStore, StoreResult};
use crate::merge::{DatasetMerger, MergeReport};
use crate::primitive::{Dataset, Primitive, PrimitiveId};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::{Mutex, RwLock};

/// Permanent store holding a single dataset behind a lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Dataset>,
    downloads: Mutex<Vec<DownloadRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `dataset`
    pub fn with_dataset(dataset: Dataset) -> Self {
        Self {
            data: RwLock::new(dataset),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Insert or replace a primitive directly, bypassing merge rules
    pub fn insert(&self, primitive: Primitive) {
        self.data.write().unwrap().insert(primitive);
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PermanentStore for MemoryStore {
    fn lookup(&self, id: &PrimitiveId) -> StoreResult<Option<Primitive>> {
        Ok(self.data.read().unwrap().get(id).cloned())
    }

    fn merge_from(&self, source: &Dataset, merger: &DatasetMerger) -> StoreResult<MergeReport> {
        // One write lock for validation and application; the merger validates
        // before touching anything, so a rejected merge leaves no trace.
        let mut data = self.data.write().unwrap();
        Ok(merger.merge(&mut data, source)?)
    }

    fn on_post_download(&self, missing: &BTreeSet<PrimitiveId>) -> StoreResult<()> {
        self.downloads.lock().unwrap().push(DownloadRecord {
            at: Utc::now(),
            missing: missing.clone(),
        });
        Ok(())
    }

    fn snapshot(&self) -> StoreResult<Dataset> {
        Ok(self.data.read().unwrap().clone())
    }

    fn downloads(&self) -> StoreResult<Vec<DownloadRecord>> {
        Ok(self.downloads.lock().unwrap().clone())
    }
}
