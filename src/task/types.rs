//! Phases and outcomes of a fetch task

use crate::error::FetchError;
use crate::merge::MergeReport;
use crate::primitive::{Dataset, PrimitiveId};
use std::collections::BTreeSet;
use std::fmt;

/// Where a fetch task currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Init,
    BatchFetching { ids: usize },
    Merging,
    ScanningForIncomplete,
    BackfillFetching { line: PrimitiveId, round: usize },
    Completed,
    Canceled,
    Failed,
}

impl FetchPhase {
    /// Whether the task has settled
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchPhase::Completed | FetchPhase::Canceled | FetchPhase::Failed
        )
    }
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::Init => f.write_str("initializing"),
            FetchPhase::BatchFetching { ids } => write!(f, "fetching {} objects", ids),
            FetchPhase::Merging => f.write_str("merging"),
            FetchPhase::ScanningForIncomplete => f.write_str("scanning for incomplete lines"),
            FetchPhase::BackfillFetching { line, round } => {
                write!(f, "backfilling {} (fetch #{})", line, round)
            }
            FetchPhase::Completed => f.write_str("completed"),
            FetchPhase::Canceled => f.write_str("canceled"),
            FetchPhase::Failed => f.write_str("failed"),
        }
    }
}

/// What a completed fetch hands to its caller
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// The working dataset, referentially integral
    pub dataset: Dataset,
    /// Ids the server reported absent
    pub missing: BTreeSet<PrimitiveId>,
    /// Lines fetched in full to complete their points
    pub backfilled: Vec<PrimitiveId>,
}

/// Final state of a fetch task
#[derive(Debug)]
pub enum FetchOutcome {
    Completed(FetchReport),
    Canceled,
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, FetchOutcome::Completed(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, FetchOutcome::Canceled)
    }

    pub fn into_report(self) -> Option<FetchReport> {
        match self {
            FetchOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn phase(&self) -> FetchPhase {
        match self {
            FetchOutcome::Completed(_) => FetchPhase::Completed,
            FetchOutcome::Canceled => FetchPhase::Canceled,
            FetchOutcome::Failed(_) => FetchPhase::Failed,
        }
    }
}

impl From<Result<FetchReport, FetchError>> for FetchOutcome {
    fn from(result: Result<FetchReport, FetchError>) -> Self {
        match result {
            Ok(report) => FetchOutcome::Completed(report),
            Err(FetchError::Canceled) => FetchOutcome::Canceled,
            Err(e) => FetchOutcome::Failed(e),
        }
    }
}

/// Result of handing a fetch outcome to the caller's side
#[derive(Debug)]
pub enum Settlement {
    /// The report was delivered and merged
    Applied {
        report: FetchReport,
        merge: MergeReport,
    },
    /// Cancellation was requested; nothing was delivered
    Canceled,
    /// The fetch failed, or delivering its result failed
    Failed(FetchError),
}
