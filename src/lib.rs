//! primfetch: incremental fetch-and-merge of map primitives
//!
//! Fetches points, lines and relations by id from a remote map API and
//! reconciles them into a local dataset without ever leaving a line with
//! unresolved points behind.
//!
//! # Core Concepts
//!
//! - **Primitives**: points, lines (ordered point ids) and relations
//!   (typed members), complete or not yet downloaded
//! - **Working dataset**: owned by one fetch task, referentially integral
//! - **Fetch task**: batch fetch, merge, backfill of incomplete lines,
//!   then a single hand-off to the caller's permanent store
//!
//! # Example
//!
//! ```
//! use primfetch::{
//!     Coord, FetchTask, MemoryStore, MemoryTransport, Primitive, PrimitiveId,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let remote = MemoryTransport::with_objects([
//!     Primitive::point(1, 1, Coord::new(50.0, 8.0)),
//!     Primitive::point(2, 1, Coord::new(50.1, 8.1)),
//!     Primitive::line(10, 1, vec![1, 2]),
//! ]);
//! let task = FetchTask::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(remote),
//!     [PrimitiveId::line(10)],
//! );
//! let report = task.run().await.into_report().unwrap();
//! assert_eq!(report.dataset.len(), 3);
//! # });
//! ```

pub mod cancel;
pub mod config;
mod error;
pub mod merge;
pub mod primitive;
pub mod reader;
pub mod registry;
pub mod store;
pub mod task;
pub mod transport;

pub use cancel::CancellationToken;
pub use config::{ConfigError, FetchConfig, MissingDependentPolicy};
pub use error::{FetchError, FetchResult};
pub use merge::{DatasetMerger, MergePolicy, MergeReport, Resolution};
pub use primitive::{
    Body, ConsistencyError, Coord, Dataset, Kind, Member, ParseIdError, Primitive, PrimitiveId,
    Tags,
};
pub use registry::IdentityRegistry;
pub use store::{
    DownloadRecord, DynStore, MemoryStore, OpenStore, PermanentStore, SqliteStore, StoreError,
    StoreResult,
};
pub use task::{
    CompletionHandler, FetchHandle, FetchOutcome, FetchPhase, FetchReport, FetchTask, Settlement,
    StoreHandoff,
};
#[cfg(feature = "http")]
pub use transport::OsmApiTransport;
pub use transport::{DynTransport, Fetched, MemoryTransport, TransferError, TransferResult, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
