//! Readers turning transport answers into integral datasets
//!
//! - [`MultiFetchReader`]: many ids at once, tracks the ids the server
//!   reported missing
//! - [`ObjectReader`]: one id, optionally with all of its dependents

mod batch;
mod single;

pub use batch::{BatchResult, MultiFetchReader};
pub use single::ObjectReader;

use crate::cancel::CancellationToken;
use crate::error::{FetchError, FetchResult};
use crate::transport::TransferResult;
use std::future::Future;

/// Run a transport call unless cancellation wins the race
pub(crate) async fn race_cancel<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = TransferResult<T>>,
) -> FetchResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Canceled),
        result = call => Ok(result?),
    }
}

/// Fail with `Canceled` once cancellation has been requested
pub(crate) fn check_cancel(cancel: &CancellationToken) -> FetchResult<()> {
    if cancel.is_cancelled() {
        Err(FetchError::Canceled)
    } else {
        Ok(())
    }
}
