//! Permanent stores: where fetched primitives finally land
//!
//! The fetch pipeline reads a store through `lookup` while it runs and
//! writes it exactly once, through `merge_from`, after completion.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DownloadRecord, OpenStore, PermanentStore, StoreError, StoreResult};

use std::sync::Arc;

/// Shared handle to a permanent store
pub type DynStore = Arc<dyn PermanentStore>;
