//! Fetch task: batch-fetch requested ids, then backfill the points of
//! incomplete lines, all into a private working dataset

use super::handoff::CompletionHandler;
use super::types::{FetchOutcome, FetchPhase, FetchReport, Settlement};
use crate::cancel::CancellationToken;
use crate::config::{FetchConfig, MissingDependentPolicy};
use crate::error::{FetchError, FetchResult};
use crate::merge::DatasetMerger;
use crate::primitive::{ConsistencyError, Dataset, PrimitiveId};
use crate::reader::{check_cancel, MultiFetchReader, ObjectReader};
use crate::registry::IdentityRegistry;
use crate::store::DynStore;
use crate::transport::DynTransport;
use std::collections::BTreeSet;
use tokio::sync::{oneshot, watch};
use tracing::Instrument;
use uuid::Uuid;

/// A single fetch of a set of ids.
///
/// The task reads the permanent store but never writes it. Its result is a
/// self-contained dataset handed over through [`FetchHandle::finish`].
pub struct FetchTask {
    id: Uuid,
    ids: Vec<PrimitiveId>,
    store: DynStore,
    transport: DynTransport,
    config: FetchConfig,
    cancel: CancellationToken,
    phase: watch::Sender<FetchPhase>,
}

impl FetchTask {
    /// Create a task fetching `ids` with the default configuration
    pub fn new(
        store: DynStore,
        transport: DynTransport,
        ids: impl IntoIterator<Item = PrimitiveId>,
    ) -> Self {
        let (phase, _) = watch::channel(FetchPhase::Init);
        Self {
            id: Uuid::new_v4(),
            ids: ids.into_iter().collect(),
            store,
            transport,
            config: FetchConfig::default(),
            cancel: CancellationToken::new(),
            phase,
        }
    }

    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an externally owned token, e.g. one shared by several tasks
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watch the phase this task is in
    pub fn phases(&self) -> watch::Receiver<FetchPhase> {
        self.phase.subscribe()
    }

    /// Run to a terminal outcome on the current task
    pub async fn run(self) -> FetchOutcome {
        let span = tracing::info_span!("fetch", task = %self.id, ids = self.ids.len());
        async move {
            let outcome = FetchOutcome::from(self.drive().await);
            match &outcome {
                FetchOutcome::Completed(report) => tracing::info!(
                    objects = report.dataset.len(),
                    missing = report.missing.len(),
                    backfilled = report.backfilled.len(),
                    "fetch completed"
                ),
                FetchOutcome::Canceled => tracing::info!("fetch canceled"),
                FetchOutcome::Failed(e) => tracing::warn!(error = %e, "fetch failed"),
            }
            self.enter(outcome.phase());
            outcome
        }
        .instrument(span)
        .await
    }

    /// Run on the tokio runtime and return a handle to the running task
    pub fn spawn(self) -> FetchHandle {
        let cancel = self.cancel.clone();
        let phase = self.phase.subscribe();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            // The handle may already be gone
            let _ = tx.send(self.run().await);
        });
        FetchHandle {
            cancel,
            phase,
            outcome: rx,
        }
    }

    fn enter(&self, phase: FetchPhase) {
        match phase {
            FetchPhase::BackfillFetching { .. } => tracing::debug!(%phase, "entering phase"),
            _ => tracing::info!(%phase, "entering phase"),
        }
        self.phase.send_replace(phase);
    }

    async fn drive(&self) -> FetchResult<FetchReport> {
        self.enter(FetchPhase::Init);
        check_cancel(&self.cancel)?;

        if let Some(id) = self.ids.iter().find(|id| id.is_new()) {
            return Err(FetchError::InvalidRequest(format!(
                "{} exists only locally and cannot be fetched",
                id
            )));
        }

        let merger = DatasetMerger::new().with_policy(self.config.working_merge);
        let mut working = Dataset::new();
        let mut missing = BTreeSet::new();

        let mut reader = MultiFetchReader::new(self.transport.clone());
        {
            let registry = IdentityRegistry::new(&*self.store);
            for id in &self.ids {
                reader.append(&registry.reference_for(*id));
            }
        }

        if !reader.is_empty() {
            self.enter(FetchPhase::BatchFetching { ids: reader.len() });
            let batch = reader.read(&self.cancel).await?;
            check_cancel(&self.cancel)?;

            self.enter(FetchPhase::Merging);
            let report = merger.merge(&mut working, &batch.dataset)?;
            tracing::debug!(written = report.written(), missing = batch.missing.len(), "batch merged");
            missing = batch.missing;
        }

        let backfilled = self.backfill(&merger, &mut working, &mut missing).await?;
        check_cancel(&self.cancel)?;

        Ok(FetchReport {
            dataset: working,
            missing,
            backfilled,
        })
    }

    /// Fetch every line with incomplete points in full, once per line,
    /// until no unattempted line remains
    async fn backfill(
        &self,
        merger: &DatasetMerger,
        working: &mut Dataset,
        missing: &mut BTreeSet<PrimitiveId>,
    ) -> FetchResult<Vec<PrimitiveId>> {
        let mut attempted: BTreeSet<PrimitiveId> = BTreeSet::new();
        let mut settled: BTreeSet<PrimitiveId> = BTreeSet::new();
        let mut backfilled = Vec::new();
        let mut fetches = 0usize;

        loop {
            check_cancel(&self.cancel)?;
            self.enter(FetchPhase::ScanningForIncomplete);

            let (retried, fresh): (Vec<_>, Vec<_>) = working
                .lines_with_incomplete_points()
                .into_iter()
                .filter(|line| !settled.contains(line))
                .partition(|line| attempted.contains(line));

            if retried.is_empty() && fresh.is_empty() {
                return Ok(backfilled);
            }

            // Fetched in full and still incomplete: the server lacks the points
            for line in retried {
                let points = working.incomplete_points(&line);
                match self.config.missing_dependents {
                    MissingDependentPolicy::Fail => {
                        return Err(ConsistencyError::UnresolvedDependents { line, points }.into());
                    }
                    MissingDependentPolicy::KeepIncomplete => {
                        tracing::warn!(%line, unresolved = points.len(), "keeping line with incomplete points");
                        missing.extend(points);
                        settled.insert(line);
                    }
                }
            }

            for line in fresh {
                check_cancel(&self.cancel)?;
                // An earlier line of this round may have brought the points along
                if !working.has_incomplete_points(&line) {
                    continue;
                }
                fetches += 1;
                if fetches > self.config.max_backfill_fetches {
                    return Err(ConsistencyError::BackfillBoundExceeded {
                        limit: self.config.max_backfill_fetches,
                    }
                    .into());
                }

                self.enter(FetchPhase::BackfillFetching {
                    line,
                    round: fetches,
                });
                attempted.insert(line);

                let full = ObjectReader::new(self.transport.clone(), line)
                    .full(true)
                    .read(&self.cancel)
                    .await?;
                check_cancel(&self.cancel)?;

                match full {
                    Some(dataset) => {
                        merger.merge(working, &dataset)?;
                        backfilled.push(line);
                    }
                    None => tracing::debug!(%line, "line no longer on server"),
                }
            }
        }
    }
}

/// Handle to a spawned [`FetchTask`]
pub struct FetchHandle {
    cancel: CancellationToken,
    phase: watch::Receiver<FetchPhase>,
    outcome: oneshot::Receiver<FetchOutcome>,
}

impl FetchHandle {
    /// Request cancellation. The task stops at its next check and nothing
    /// is delivered to the caller.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The phase the task was last seen in
    pub fn phase(&self) -> FetchPhase {
        *self.phase.borrow()
    }

    pub fn phases(&self) -> watch::Receiver<FetchPhase> {
        self.phase.clone()
    }

    /// Wait for the terminal outcome
    pub async fn outcome(self) -> FetchOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Failed(FetchError::Aborted),
        }
    }

    /// Wait for the outcome and, if the fetch completed and was not canceled
    /// in the meantime, hand the report to `handler`.
    pub async fn finish<H>(self, handler: &mut H) -> Settlement
    where
        H: CompletionHandler + ?Sized,
    {
        let cancel = self.cancel.clone();
        match self.outcome().await {
            FetchOutcome::Completed(_) if cancel.is_cancelled() => Settlement::Canceled,
            FetchOutcome::Completed(report) => match handler.on_completed(&report) {
                Ok(merge) => Settlement::Applied { report, merge },
                Err(e) => Settlement::Failed(e.into()),
            },
            FetchOutcome::Canceled => Settlement::Canceled,
            FetchOutcome::Failed(e) => Settlement::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Coord, Primitive};
    use crate::store::MemoryStore;
    use crate::transport::MemoryTransport;
    use std::sync::Arc;

    fn remote() -> MemoryTransport {
        MemoryTransport::with_objects([
            Primitive::point(1, 1, Coord::new(50.0, 8.0)),
            Primitive::point(2, 1, Coord::new(50.1, 8.1)),
            Primitive::point(3, 1, Coord::new(50.2, 8.2)),
            Primitive::line(10, 1, vec![1, 2, 3]),
        ])
    }

    #[tokio::test]
    async fn test_backfill_completes_line() {
        let transport = Arc::new(remote());
        let task = FetchTask::new(
            Arc::new(MemoryStore::new()),
            transport.clone(),
            [PrimitiveId::point(1), PrimitiveId::point(2), PrimitiveId::line(10)],
        );

        let report = task.run().await.into_report().unwrap();
        assert!(report.missing.is_empty());
        assert_eq!(report.backfilled, vec![PrimitiveId::line(10)]);
        assert!(report.dataset.get(&PrimitiveId::point(3)).unwrap().is_complete());
        assert!(report.dataset.check_integrity().is_ok());
        assert_eq!(transport.single_calls(), 1);
    }

    #[tokio::test]
    async fn test_phase_is_terminal_after_run() {
        let task = FetchTask::new(
            Arc::new(MemoryStore::new()),
            Arc::new(remote()),
            [PrimitiveId::point(1)],
        );
        let phases = task.phases();
        assert!(task.run().await.is_completed());
        assert_eq!(*phases.borrow(), FetchPhase::Completed);
    }

    #[tokio::test]
    async fn test_empty_request_makes_no_calls() {
        let transport = Arc::new(remote());
        let task = FetchTask::new(
            Arc::new(MemoryStore::new()),
            transport.clone(),
            Vec::<PrimitiveId>::new(),
        );

        let report = task.run().await.into_report().unwrap();
        assert!(report.dataset.is_empty());
        assert!(report.missing.is_empty());
        assert_eq!(transport.batch_calls(), 0);
        assert_eq!(transport.single_calls(), 0);
    }

    #[tokio::test]
    async fn test_new_id_is_rejected() {
        let task = FetchTask::new(
            Arc::new(MemoryStore::new()),
            Arc::new(remote()),
            [PrimitiveId::point(1), PrimitiveId::point(-4)],
        );
        let outcome = task.run().await;
        assert!(matches!(
            outcome.error(),
            Some(FetchError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let transport = Arc::new(remote());
        let task = FetchTask::new(
            Arc::new(MemoryStore::new()),
            transport.clone(),
            [PrimitiveId::line(10)],
        );
        task.cancellation_token().cancel();

        assert!(task.run().await.is_canceled());
        assert_eq!(transport.batch_calls(), 0);
    }

    #[tokio::test]
    async fn test_spawned_handle_reports_outcome() {
        let handle = FetchTask::new(
            Arc::new(MemoryStore::new()),
            Arc::new(remote()),
            [PrimitiveId::line(10)],
        )
        .spawn();

        let outcome = handle.outcome().await;
        let report = outcome.into_report().unwrap();
        assert_eq!(report.dataset.len(), 4);
    }
}
