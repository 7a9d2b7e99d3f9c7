//! Transports: how primitives are retrieved from the remote store
//!
//! The fetch pipeline only needs three outcomes per id: found with a body,
//! not found, or a transport fault. Wire formats stay behind this trait.

#[cfg(feature = "http")]
mod http;
mod memory;
pub mod wire;

#[cfg(feature = "http")]
pub use http::OsmApiTransport;
pub use memory::MemoryTransport;

use crate::primitive::{Primitive, PrimitiveId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Largest number of ids per multi-fetch request unless a transport says otherwise
pub const DEFAULT_MAX_BATCH_SIZE: usize = 200;

/// Network or protocol fault. Voids the whole request that raised it.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Transport worker failed: {0}")]
    Worker(String),
}

/// Result type for transport operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Per-id answer to a multi-fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Found(Primitive),
    NotFound(PrimitiveId),
}

impl Fetched {
    pub fn id(&self) -> PrimitiveId {
        match self {
            Fetched::Found(primitive) => primitive.id(),
            Fetched::NotFound(id) => *id,
        }
    }
}

/// Access to the remote store
///
/// Implementations must be thread-safe; a fetch task runs on a background
/// tokio task. Cancellation is applied by the caller racing these futures
/// against a token, so implementations must tolerate being dropped mid-call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Maximum number of ids accepted by one [`batch_get`](Transport::batch_get)
    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }

    /// Fetch many primitives at once.
    ///
    /// Every requested id must be answered with either `Found` or `NotFound`.
    /// Bodies refer to other primitives by id only; referenced primitives are
    /// not included.
    async fn batch_get(&self, ids: &[PrimitiveId]) -> TransferResult<Vec<Fetched>>;

    /// Fetch one primitive. With `full`, the answer also contains everything
    /// the primitive structurally depends on (the points of a line; the
    /// members of a relation and the points of its member lines).
    ///
    /// Returns `None` when the server reports the primitive absent.
    async fn single_get(&self, id: PrimitiveId, full: bool)
        -> TransferResult<Option<Vec<Primitive>>>;
}

/// Shared handle to a transport
pub type DynTransport = Arc<dyn Transport>;
