//! Transports with scripted behavior

use async_trait::async_trait;
use primfetch::{
    CancellationToken, Coord, Fetched, MemoryTransport, Primitive, PrimitiveId, TransferResult,
    Transport,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Delegates to a [`MemoryTransport`], but requests cancellation from
/// inside the first batch call
pub struct CancelOnBatch {
    pub inner: MemoryTransport,
    pub token: CancellationToken,
}

impl CancelOnBatch {
    pub fn new(inner: MemoryTransport, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait]
impl Transport for CancelOnBatch {
    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn batch_get(&self, ids: &[PrimitiveId]) -> TransferResult<Vec<Fetched>> {
        self.token.cancel();
        self.inner.batch_get(ids).await
    }

    async fn single_get(
        &self,
        id: PrimitiveId,
        full: bool,
    ) -> TransferResult<Option<Vec<Primitive>>> {
        self.inner.single_get(id, full).await
    }
}

/// Delegates to a [`MemoryTransport`], but requests cancellation from
/// inside every single-object call
pub struct CancelOnSingle {
    pub inner: MemoryTransport,
    pub token: CancellationToken,
}

impl CancelOnSingle {
    pub fn new(inner: MemoryTransport, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait]
impl Transport for CancelOnSingle {
    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn batch_get(&self, ids: &[PrimitiveId]) -> TransferResult<Vec<Fetched>> {
        self.inner.batch_get(ids).await
    }

    async fn single_get(
        &self,
        id: PrimitiveId,
        full: bool,
    ) -> TransferResult<Option<Vec<Primitive>>> {
        self.token.cancel();
        self.inner.single_get(id, full).await
    }
}

/// A server where fetching line `k` in full always reveals line `k + 1`
/// with a point nobody has seen yet
#[derive(Default)]
pub struct EndlessChain {
    pub single_calls: AtomicUsize,
}

impl EndlessChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(k: i64) -> Primitive {
        Primitive::line(k, 1, vec![k])
    }

    fn point(k: i64) -> Primitive {
        Primitive::point(k, 1, Coord::new(0.0, k as f64 / 1000.0))
    }
}

#[async_trait]
impl Transport for EndlessChain {
    fn max_batch_size(&self) -> usize {
        50
    }

    async fn batch_get(&self, ids: &[PrimitiveId]) -> TransferResult<Vec<Fetched>> {
        Ok(ids
            .iter()
            .map(|id| match id.kind() {
                primfetch::Kind::Line => Fetched::Found(Self::line(id.id())),
                _ => Fetched::NotFound(*id),
            })
            .collect())
    }

    async fn single_get(
        &self,
        id: PrimitiveId,
        _full: bool,
    ) -> TransferResult<Option<Vec<Primitive>>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        let k = id.id();
        Ok(Some(vec![
            Self::line(k),
            Self::point(k),
            Self::line(k + 1),
        ]))
    }
}
