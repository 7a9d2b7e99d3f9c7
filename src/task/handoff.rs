//! Delivery of a completed fetch to the caller's permanent store

use super::types::FetchReport;
use crate::merge::{DatasetMerger, MergePolicy, MergeReport};
use crate::store::{DynStore, StoreResult};

/// Receives a completed fetch on the caller's side.
///
/// Runs wherever the caller awaits [`FetchHandle::finish`]; that await point
/// is the caller's synchronization context.
///
/// [`FetchHandle::finish`]: super::FetchHandle::finish
pub trait CompletionHandler {
    fn on_completed(&mut self, report: &FetchReport) -> StoreResult<MergeReport>;
}

impl<F> CompletionHandler for F
where
    F: FnMut(&FetchReport) -> StoreResult<MergeReport>,
{
    fn on_completed(&mut self, report: &FetchReport) -> StoreResult<MergeReport> {
        self(report)
    }
}

/// Merges the fetched dataset into a permanent store, then records the
/// download there.
///
/// The merge is what the caller asked for: once it has committed the
/// download counts as applied. A failure to write the download record
/// afterwards is logged and does not turn the settlement into a failure.
pub struct StoreHandoff {
    store: DynStore,
    merger: DatasetMerger,
}

impl StoreHandoff {
    pub fn new(store: DynStore, policy: MergePolicy) -> Self {
        Self {
            store,
            merger: DatasetMerger::new().with_policy(policy),
        }
    }
}

impl CompletionHandler for StoreHandoff {
    fn on_completed(&mut self, report: &FetchReport) -> StoreResult<MergeReport> {
        let merge = self.store.merge_from(&report.dataset, &self.merger)?;
        if let Err(e) = self.store.on_post_download(&report.missing) {
            tracing::warn!(error = %e, "download merged but its record could not be written");
        }
        tracing::info!(
            added = merge.added,
            completed = merge.completed,
            updated = merge.updated,
            conflicts = merge.conflicts.len(),
            "merged download into store"
        );
        Ok(merge)
    }
}
