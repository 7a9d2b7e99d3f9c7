//! In-process remote store
//!
//! Serves primitives from a concurrent map. Used by tests and demos, with
//! knobs for latency, batch size and injected faults.

use super::{Fetched, TransferError, TransferResult, Transport, DEFAULT_MAX_BATCH_SIZE};
use crate::primitive::{Dataset, Kind, Primitive, PrimitiveId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A remote store living in memory
#[derive(Debug)]
pub struct MemoryTransport {
    objects: DashMap<PrimitiveId, Primitive>,
    max_batch_size: usize,
    latency: Option<Duration>,
    /// 1-based number of the batch call that fails
    fail_batch_call: Option<usize>,
    failing_singles: HashSet<PrimitiveId>,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
    batch_log: Mutex<Vec<Vec<PrimitiveId>>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create an empty remote store
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            latency: None,
            fail_batch_call: None,
            failing_singles: HashSet::new(),
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
            batch_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a remote store serving the given primitives
    pub fn with_objects(objects: impl IntoIterator<Item = Primitive>) -> Self {
        let transport = Self::new();
        for primitive in objects {
            transport.insert(primitive);
        }
        transport
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the `n`-th batch call (1-based) fail with a server error
    pub fn fail_batch_call(mut self, n: usize) -> Self {
        self.fail_batch_call = Some(n);
        self
    }

    /// Make single fetches of `id` fail with a server error
    pub fn fail_single(mut self, id: PrimitiveId) -> Self {
        self.failing_singles.insert(id);
        self
    }

    /// Add or replace a primitive on the server
    pub fn insert(&self, primitive: Primitive) {
        self.objects.insert(primitive.id(), primitive);
    }

    pub fn remove(&self, id: &PrimitiveId) -> Option<Primitive> {
        self.objects.remove(id).map(|(_, p)| p)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    /// Ids of every batch call so far, in call order
    pub fn batch_log(&self) -> Vec<Vec<PrimitiveId>> {
        self.batch_log.lock().unwrap().clone()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn get(&self, id: &PrimitiveId) -> Option<Primitive> {
        self.objects.get(id).map(|entry| entry.value().clone())
    }

    fn server_error(id: impl std::fmt::Display) -> TransferError {
        TransferError::Status {
            status: 500,
            url: format!("memory://{}", id),
        }
    }

    /// The primitive plus everything it structurally depends on
    fn full(&self, root: Primitive) -> Vec<Primitive> {
        let mut out: Dataset = Dataset::new();
        let mut pending = vec![root];

        while let Some(primitive) = pending.pop() {
            let expand = match primitive.kind() {
                Kind::Point => Vec::new(),
                // Lines pull in their points; relations pull in their direct
                // members, which in turn pull in points of member lines.
                Kind::Line | Kind::Relation => primitive.references(),
            };
            let is_relation = primitive.kind() == Kind::Relation;
            out.insert(primitive);

            for id in expand {
                if out.contains(&id) || (is_relation && id.kind() == Kind::Relation) {
                    continue;
                }
                if let Some(dependent) = self.get(&id) {
                    pending.push(dependent);
                }
            }
        }
        out.into_iter().collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn batch_get(&self, ids: &[PrimitiveId]) -> TransferResult<Vec<Fetched>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_log.lock().unwrap().push(ids.to_vec());
        self.delay().await;

        if self.fail_batch_call == Some(call) {
            return Err(Self::server_error(format!("batch/{}", call)));
        }

        Ok(ids
            .iter()
            .map(|id| match self.get(id) {
                Some(primitive) => Fetched::Found(primitive),
                None => Fetched::NotFound(*id),
            })
            .collect())
    }

    async fn single_get(
        &self,
        id: PrimitiveId,
        full: bool,
    ) -> TransferResult<Option<Vec<Primitive>>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        if self.failing_singles.contains(&id) {
            return Err(Self::server_error(id));
        }

        Ok(self.get(&id).map(|primitive| {
            if full {
                self.full(primitive)
            } else {
                vec![primitive]
            }
        }))
    }
}
