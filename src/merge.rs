//! Dataset merger for reconciling fetched primitives into a target dataset
//!
//! Handles completion of placeholders, conflict resolution between complete
//! primitives, and referential validation of the incoming data.

use crate::primitive::{ConsistencyError, Dataset, Primitive, PrimitiveId};
use serde::{Deserialize, Serialize};

/// How to settle two complete primitives with the same id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Incoming data replaces the target (default)
    #[default]
    TheirsWin,
    /// Incoming data replaces the target unless the target is a newer version
    NewerVersionWins,
    /// Locally modified primitives are kept, differing server versions are
    /// reported as conflicts; unmodified ones follow `NewerVersionWins`
    KeepLocalEdits,
}

/// What a merge decided for a single incoming primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Not present in the target; inserted
    Insert,
    /// Target held a placeholder; replaced by the complete primitive
    Complete,
    /// Target held a complete primitive; replaced
    Update,
    /// Target left as it was
    Keep,
    /// Target kept, but it disagrees with the incoming version
    Conflict,
}

impl Resolution {
    /// Whether the incoming primitive should be written to the target
    pub fn writes(self) -> bool {
        matches!(self, Resolution::Insert | Resolution::Complete | Resolution::Update)
    }
}

/// Summary of one merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub completed: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Locally edited primitives the server disagrees with
    pub conflicts: Vec<PrimitiveId>,
}

impl MergeReport {
    pub fn record(&mut self, id: PrimitiveId, resolution: Resolution) {
        match resolution {
            Resolution::Insert => self.added += 1,
            Resolution::Complete => self.completed += 1,
            Resolution::Update => self.updated += 1,
            Resolution::Keep => self.unchanged += 1,
            Resolution::Conflict => self.conflicts.push(id),
        }
    }

    /// Number of primitives written to the target
    pub fn written(&self) -> usize {
        self.added + self.completed + self.updated
    }
}

/// Merges a source dataset ("theirs") into a target dataset ("mine")
#[derive(Debug, Clone, Default)]
pub struct DatasetMerger {
    pub policy: MergePolicy,
}

impl DatasetMerger {
    /// Create a new merger with the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a specific policy
    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decide the fate of `theirs` given the target's current entry
    pub fn resolve(&self, mine: Option<&Primitive>, theirs: &Primitive) -> Resolution {
        let Some(mine) = mine else {
            return Resolution::Insert;
        };

        match (mine.is_complete(), theirs.is_complete()) {
            (_, false) => Resolution::Keep,
            (false, true) => Resolution::Complete,
            (true, true) => self.resolve_complete(mine, theirs),
        }
    }

    fn resolve_complete(&self, mine: &Primitive, theirs: &Primitive) -> Resolution {
        let differs = !mine.same_content(theirs);
        match self.policy {
            MergePolicy::TheirsWin if differs => Resolution::Update,
            MergePolicy::TheirsWin => Resolution::Keep,
            MergePolicy::NewerVersionWins => newer_wins(mine, theirs, differs),
            MergePolicy::KeepLocalEdits if mine.modified => {
                if theirs.version != mine.version {
                    Resolution::Conflict
                } else {
                    Resolution::Keep
                }
            }
            MergePolicy::KeepLocalEdits => newer_wins(mine, theirs, differs),
        }
    }

    /// Check that every reference in `source` resolves in `source` or `target`
    pub fn validate(&self, target: &Dataset, source: &Dataset) -> Result<(), ConsistencyError> {
        for primitive in source {
            for to in primitive.references() {
                if !source.contains(&to) && !target.contains(&to) {
                    return Err(ConsistencyError::DanglingReference {
                        from: primitive.id(),
                        to,
                    });
                }
            }
        }
        Ok(())
    }

    /// Merge `source` into `target`.
    ///
    /// Validation runs before any mutation: on error the target is untouched.
    /// Merging the same source twice leaves the target as after the first merge.
    pub fn merge(
        &self,
        target: &mut Dataset,
        source: &Dataset,
    ) -> Result<MergeReport, ConsistencyError> {
        self.validate(target, source)?;

        let mut report = MergeReport::default();
        for theirs in source {
            let resolution = self.resolve(target.get(&theirs.id()), theirs);
            if resolution.writes() {
                target.insert(theirs.clone());
            }
            report.record(theirs.id(), resolution);
        }
        Ok(report)
    }
}

fn newer_wins(mine: &Primitive, theirs: &Primitive, differs: bool) -> Resolution {
    if differs && theirs.version >= mine.version {
        Resolution::Update
    } else {
        Resolution::Keep
    }
}
