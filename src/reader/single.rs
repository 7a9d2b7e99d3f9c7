//! Single-object reader

use super::{check_cancel, race_cancel};
use crate::cancel::CancellationToken;
use crate::error::FetchResult;
use crate::primitive::{Dataset, PrimitiveId};
use crate::transport::{DynTransport, TransferError};

/// Reads one primitive, optionally together with its dependents
pub struct ObjectReader {
    transport: DynTransport,
    id: PrimitiveId,
    full: bool,
}

impl ObjectReader {
    pub fn new(transport: DynTransport, id: PrimitiveId) -> Self {
        Self {
            transport,
            id,
            full: false,
        }
    }

    /// Also fetch everything the primitive structurally depends on
    pub fn full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Fetch the primitive. `None` means the server reported it absent.
    pub async fn read(&self, cancel: &CancellationToken) -> FetchResult<Option<Dataset>> {
        check_cancel(cancel)?;
        tracing::debug!(id = %self.id, full = self.full, "single fetch");

        let Some(primitives) =
            race_cancel(cancel, self.transport.single_get(self.id, self.full)).await?
        else {
            return Ok(None);
        };

        let mut dataset = Dataset::new();
        for primitive in primitives {
            check_cancel(cancel)?;
            if !primitive.is_complete() {
                return Err(TransferError::Malformed(format!(
                    "server returned {} without a body",
                    primitive.id()
                ))
                .into());
            }
            dataset.insert(primitive);
        }

        if !dataset.contains(&self.id) {
            return Err(TransferError::Malformed(format!(
                "response for {} does not contain it",
                self.id
            ))
            .into());
        }

        dataset.fill_placeholders();
        Ok(Some(dataset))
    }
}
