//! Top-level error type for fetch operations

use crate::primitive::ConsistencyError;
use crate::store::StoreError;
use crate::transport::TransferError;
use thiserror::Error;

/// Why a fetch operation did not complete
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Inconsistent data: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cancellation observed. Internal plumbing; surfaces as
    /// [`FetchOutcome::Canceled`](crate::FetchOutcome::Canceled).
    #[error("Operation canceled")]
    Canceled,

    #[error("Fetch task ended without reporting an outcome")]
    Aborted,
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;
