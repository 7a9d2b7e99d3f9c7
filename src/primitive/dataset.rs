//! Dataset: an identity-keyed collection of primitives

use super::{Kind, Primitive, PrimitiveId};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use thiserror::Error;

/// Violations of the referential contract between primitives
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("{from} refers to {to}, which is present nowhere")]
    DanglingReference { from: PrimitiveId, to: PrimitiveId },

    #[error("{line} still has unresolved points after backfill: {}", format_ids(.points))]
    UnresolvedDependents {
        line: PrimitiveId,
        points: Vec<PrimitiveId>,
    },

    #[error("backfill exceeded its bound of {limit} single-object fetches")]
    BackfillBoundExceeded { limit: usize },
}

fn format_ids(ids: &[PrimitiveId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Identity-keyed primitive collection
///
/// References between primitives are ids, so replacing an entry makes every
/// referrer see the new value without any repointing. Iteration order is the
/// id order (points, then lines, then relations).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    primitives: BTreeMap<PrimitiveId, Primitive>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn get(&self, id: &PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id)
    }

    pub fn contains(&self, id: &PrimitiveId) -> bool {
        self.primitives.contains_key(id)
    }

    /// Insert or replace, returning the previous entry
    pub fn insert(&mut self, primitive: Primitive) -> Option<Primitive> {
        self.primitives.insert(primitive.id(), primitive)
    }

    pub fn remove(&mut self, id: &PrimitiveId) -> Option<Primitive> {
        self.primitives.remove(id)
    }

    pub fn iter(&self) -> btree_map::Values<'_, PrimitiveId, Primitive> {
        self.primitives.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.primitives.keys().copied()
    }

    /// Primitives of one kind
    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &Primitive> {
        self.primitives
            .range(PrimitiveId::new(kind, i64::MIN)..=PrimitiveId::new(kind, i64::MAX))
            .map(|(_, p)| p)
    }

    /// Number of primitives that have no body
    pub fn incomplete_count(&self) -> usize {
        self.iter().filter(|p| !p.is_complete()).count()
    }

    /// Points of `line` that are absent or incomplete here.
    ///
    /// Empty when `line` is unknown, incomplete, or fully resolved.
    pub fn incomplete_points(&self, line: &PrimitiveId) -> Vec<PrimitiveId> {
        let Some(points) = self.get(line).and_then(Primitive::line_points) else {
            return Vec::new();
        };
        let unresolved: BTreeSet<PrimitiveId> = points
            .iter()
            .map(|&id| PrimitiveId::point(id))
            .filter(|id| !self.get(id).is_some_and(Primitive::is_complete))
            .collect();
        unresolved.into_iter().collect()
    }

    /// Whether `line` is complete but refers to at least one incomplete point
    pub fn has_incomplete_points(&self, line: &PrimitiveId) -> bool {
        !self.incomplete_points(line).is_empty()
    }

    /// Complete lines that refer to at least one incomplete point, in id order
    pub fn lines_with_incomplete_points(&self) -> Vec<PrimitiveId> {
        self.of_kind(Kind::Line)
            .filter(|line| self.has_incomplete_points(&line.id()))
            .map(Primitive::id)
            .collect()
    }

    /// Every `(from, to)` pair where `to` is not in this dataset
    pub fn dangling_references(&self) -> Vec<(PrimitiveId, PrimitiveId)> {
        let mut dangling = Vec::new();
        for primitive in self.iter() {
            for to in primitive.references() {
                if !self.contains(&to) {
                    dangling.push((primitive.id(), to));
                }
            }
        }
        dangling
    }

    /// Fail on the first reference that does not resolve inside this dataset
    pub fn check_integrity(&self) -> Result<(), ConsistencyError> {
        match self.dangling_references().first() {
            Some(&(from, to)) => Err(ConsistencyError::DanglingReference { from, to }),
            None => Ok(()),
        }
    }

    /// Add an incomplete placeholder for every reference that does not
    /// resolve. Returns the ids that were added.
    pub fn fill_placeholders(&mut self) -> Vec<PrimitiveId> {
        let missing: BTreeSet<PrimitiveId> =
            self.dangling_references().into_iter().map(|(_, to)| to).collect();
        for id in &missing {
            self.insert(Primitive::incomplete(*id));
        }
        missing.into_iter().collect()
    }
}

impl FromIterator<Primitive> for Dataset {
    fn from_iter<I: IntoIterator<Item = Primitive>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        dataset.extend(iter);
        dataset
    }
}

impl Extend<Primitive> for Dataset {
    fn extend<I: IntoIterator<Item = Primitive>>(&mut self, iter: I) {
        for primitive in iter {
            self.insert(primitive);
        }
    }
}

impl IntoIterator for Dataset {
    type Item = Primitive;
    type IntoIter = btree_map::IntoValues<PrimitiveId, Primitive>;

    fn into_iter(self) -> Self::IntoIter {
        self.primitives.into_values()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Primitive;
    type IntoIter = btree_map::Values<'a, PrimitiveId, Primitive>;

    fn into_iter(self) -> Self::IntoIter {
        self.primitives.values()
    }
}
