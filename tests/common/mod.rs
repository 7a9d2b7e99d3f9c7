//! Common test utilities for fetch pipeline tests
//!
//! Remote worlds to fetch from, plus transports that misbehave on purpose.

pub mod transports;
pub mod worlds;

pub use transports::{CancelOnBatch, CancelOnSingle, EndlessChain};
pub use worlds::{complete_line_world, gap_line_world, local_store, relation_world};

use primfetch::{PermanentStore, PrimitiveId};

/// Ids of every primitive in a store, in id order
pub fn stored_ids(store: &dyn PermanentStore) -> Vec<PrimitiveId> {
    store
        .snapshot()
        .expect("snapshot failed")
        .ids()
        .collect()
}
