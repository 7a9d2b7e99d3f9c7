//! Multi-fetch reader

use super::{check_cancel, race_cancel};
use crate::cancel::CancellationToken;
use crate::error::FetchResult;
use crate::primitive::{Body, Dataset, Kind, Primitive, PrimitiveId};
use crate::transport::{DynTransport, Fetched, TransferError};
use std::collections::BTreeSet;

/// Outcome of a multi-fetch
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Everything the server returned, plus incomplete placeholders for
    /// references that were not returned
    pub dataset: Dataset,
    /// Ids the server reported absent
    pub missing: BTreeSet<PrimitiveId>,
}

/// Collects ids, then fetches them in as few requests as the transport allows
pub struct MultiFetchReader {
    transport: DynTransport,
    ids: BTreeSet<PrimitiveId>,
}

impl MultiFetchReader {
    pub fn new(transport: DynTransport) -> Self {
        Self {
            transport,
            ids: BTreeSet::new(),
        }
    }

    /// Request a single id. New (locally created) ids are ignored.
    pub fn append_id(&mut self, id: PrimitiveId) {
        if !id.is_new() {
            self.ids.insert(id);
        }
    }

    /// Request a primitive and, when its body is known locally, everything
    /// it refers to: the points of a line, the members of a relation.
    pub fn append(&mut self, primitive: &Primitive) {
        self.append_id(primitive.id());
        match primitive.body() {
            Some(Body::Line { .. }) | Some(Body::Relation { .. }) => {
                for id in primitive.references() {
                    self.append_id(id);
                }
            }
            Some(Body::Point { .. }) | None => {}
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.ids.iter().copied()
    }

    /// Fetch every appended id.
    ///
    /// Ids are grouped by kind and split into chunks of at most
    /// `max_batch_size`. A transfer fault or cancellation voids the whole read.
    pub async fn read(self, cancel: &CancellationToken) -> FetchResult<BatchResult> {
        let chunk_size = self.transport.max_batch_size().max(1);
        let mut result = BatchResult::default();

        for kind in Kind::ALL {
            let of_kind: Vec<PrimitiveId> =
                self.ids.iter().copied().filter(|id| id.kind() == kind).collect();

            for chunk in of_kind.chunks(chunk_size) {
                check_cancel(cancel)?;
                tracing::debug!(%kind, count = chunk.len(), "multi-fetch chunk");

                let answers = race_cancel(cancel, self.transport.batch_get(chunk)).await?;
                absorb(chunk, answers, &mut result, cancel)?;
            }
        }

        let placeholders = result.dataset.fill_placeholders();
        tracing::debug!(
            fetched = result.dataset.len() - placeholders.len(),
            placeholders = placeholders.len(),
            missing = result.missing.len(),
            "multi-fetch done"
        );
        Ok(result)
    }
}

/// Fold one chunk's answers into the result
fn absorb(
    requested: &[PrimitiveId],
    answers: Vec<Fetched>,
    result: &mut BatchResult,
    cancel: &CancellationToken,
) -> FetchResult<()> {
    let mut unanswered: BTreeSet<PrimitiveId> = requested.iter().copied().collect();

    for answer in answers {
        check_cancel(cancel)?;
        if !requested.contains(&answer.id()) {
            tracing::debug!(id = %answer.id(), "skipping answer for an id not in this chunk");
            continue;
        }
        unanswered.remove(&answer.id());
        match answer {
            Fetched::Found(primitive) => {
                if !primitive.is_complete() {
                    return Err(TransferError::Malformed(format!(
                        "server returned {} without a body",
                        primitive.id()
                    ))
                    .into());
                }
                result.dataset.insert(primitive);
            }
            Fetched::NotFound(id) => {
                result.missing.insert(id);
            }
        }
    }

    if let Some(id) = unanswered.first() {
        return Err(TransferError::Malformed(format!(
            "server neither returned nor denied {} ({} unanswered)",
            id,
            unanswered.len()
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::primitive::{Coord, Member};
    use crate::transport::MemoryTransport;
    use std::sync::Arc;

    fn server() -> MemoryTransport {
        MemoryTransport::with_objects([
            Primitive::point(1, 1, Coord::new(0.0, 0.0)),
            Primitive::point(2, 1, Coord::new(0.0, 1.0)),
            Primitive::point(3, 1, Coord::new(1.0, 1.0)),
            Primitive::line(10, 1, vec![1, 2, 3]),
            Primitive::relation(5, 1, vec![Member::new(PrimitiveId::line(10), "outer")]),
        ])
    }

    #[test]
    fn test_append_expands_known_bodies() {
        let mut reader = MultiFetchReader::new(Arc::new(MemoryTransport::new()));
        reader.append(&Primitive::line(10, 1, vec![1, 2, -4]));
        reader.append(&Primitive::incomplete(PrimitiveId::relation(5)));
        reader.append(&Primitive::incomplete(PrimitiveId::point(-1)));

        let ids: Vec<_> = reader.ids().collect();
        assert_eq!(
            ids,
            vec![
                PrimitiveId::point(1),
                PrimitiveId::point(2),
                PrimitiveId::line(10),
                PrimitiveId::relation(5)
            ]
        );
    }

    #[tokio::test]
    async fn test_read_tracks_missing_and_fills_placeholders() {
        let transport = Arc::new(server());
        let mut reader = MultiFetchReader::new(transport.clone());
        reader.append_id(PrimitiveId::point(1));
        reader.append_id(PrimitiveId::line(10));
        reader.append_id(PrimitiveId::point(42));

        let result = reader.read(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.missing, BTreeSet::from([PrimitiveId::point(42)]));
        assert!(!result.dataset.contains(&PrimitiveId::point(42)));
        assert!(result.dataset.get(&PrimitiveId::line(10)).unwrap().is_complete());
        assert!(!result.dataset.get(&PrimitiveId::point(2)).unwrap().is_complete());
        assert!(result.dataset.check_integrity().is_ok());
        // one request per kind
        assert_eq!(transport.batch_calls(), 2);
    }

    #[tokio::test]
    async fn test_read_splits_into_chunks() {
        let transport = Arc::new(server().with_max_batch_size(2));
        let mut reader = MultiFetchReader::new(transport.clone());
        for id in 1..=3 {
            reader.append_id(PrimitiveId::point(id));
        }

        reader.read(&CancellationToken::new()).await.unwrap();
        let sizes: Vec<_> = transport.batch_log().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_transfer_fault_voids_read() {
        let transport = Arc::new(server().with_max_batch_size(1).fail_batch_call(2));
        let mut reader = MultiFetchReader::new(transport);
        reader.append_id(PrimitiveId::point(1));
        reader.append_id(PrimitiveId::point(2));

        let err = reader.read(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transfer(_)));
    }

    #[tokio::test]
    async fn test_cancelled_reader_never_calls_transport() {
        let transport = Arc::new(server());
        let mut reader = MultiFetchReader::new(transport.clone());
        reader.append_id(PrimitiveId::point(1));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = reader.read(&cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::Canceled));
        assert_eq!(transport.batch_calls(), 0);
    }

    #[test]
    fn test_unrequested_answers_are_skipped() {
        let mut result = BatchResult::default();
        absorb(
            &[PrimitiveId::point(1)],
            vec![
                Fetched::Found(Primitive::point(1, 1, Coord::new(0.0, 0.0))),
                Fetched::Found(Primitive::point(9, 1, Coord::new(1.0, 0.0))),
                Fetched::NotFound(PrimitiveId::point(8)),
            ],
            &mut result,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(result.dataset.ids().collect::<Vec<_>>(), vec![PrimitiveId::point(1)]);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn test_unanswered_id_is_malformed() {
        let mut result = BatchResult::default();
        let err = absorb(
            &[PrimitiveId::point(1), PrimitiveId::point(2)],
            vec![Fetched::NotFound(PrimitiveId::point(1))],
            &mut result,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Transfer(TransferError::Malformed(_))));
    }
}
