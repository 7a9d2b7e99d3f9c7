//! Map primitives and the datasets that hold them

mod body;
mod dataset;
mod id;


pub use body::{Body, Coord, Member};
pub use dataset::{ConsistencyError, Dataset};
pub use id::{Kind, ParseIdError, PrimitiveId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form key/value tags
pub type Tags = BTreeMap<String, String>;

/// A point, line or relation
///
/// A primitive without a body is *incomplete*: a placeholder that exists only
/// because something else refers to it. The body variant always matches the
/// kind of the id; the constructors are the only way to pair them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    id: PrimitiveId,
    /// Server revision, 0 when unknown
    pub version: u64,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    /// Set on local edits that have not been uploaded
    #[serde(default)]
    pub modified: bool,
    body: Option<Body>,
}

impl Primitive {
    fn with_body(id: PrimitiveId, version: u64, body: Body) -> Self {
        Self {
            id,
            version,
            timestamp: None,
            tags: Tags::new(),
            modified: false,
            body: Some(body),
        }
    }

    /// Create a bodiless placeholder
    pub fn incomplete(id: PrimitiveId) -> Self {
        Self {
            id,
            version: 0,
            timestamp: None,
            tags: Tags::new(),
            modified: false,
            body: None,
        }
    }

    pub fn point(id: i64, version: u64, coord: Coord) -> Self {
        Self::with_body(PrimitiveId::point(id), version, Body::Point { coord })
    }

    pub fn line(id: i64, version: u64, points: Vec<i64>) -> Self {
        Self::with_body(PrimitiveId::line(id), version, Body::Line { points })
    }

    pub fn relation(id: i64, version: u64, members: Vec<Member>) -> Self {
        Self::with_body(PrimitiveId::relation(id), version, Body::Relation { members })
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Mark as locally edited
    pub fn mark_modified(mut self) -> Self {
        self.modified = true;
        self
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.id.kind()
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Whether the structural data of this primitive itself is present.
    ///
    /// A line can be complete while some of its points are not; see
    /// [`Dataset::has_incomplete_points`].
    pub fn is_complete(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_new(&self) -> bool {
        self.id.is_new()
    }

    /// Ids this primitive refers to; empty for points and incomplete primitives
    pub fn references(&self) -> Vec<PrimitiveId> {
        self.body.as_ref().map(Body::references).unwrap_or_default()
    }

    /// Point ids of a complete line
    pub fn line_points(&self) -> Option<&[i64]> {
        match &self.body {
            Some(Body::Line { points }) => Some(points),
            _ => None,
        }
    }

    /// Members of a complete relation
    pub fn relation_members(&self) -> Option<&[Member]> {
        match &self.body {
            Some(Body::Relation { members }) => Some(members),
            _ => None,
        }
    }

    pub fn coord(&self) -> Option<Coord> {
        match &self.body {
            Some(Body::Point { coord }) => Some(*coord),
            _ => None,
        }
    }

    /// Body variant agrees with the id kind. Always true for constructed
    /// values; checked on anything deserialized from outside.
    pub fn is_well_formed(&self) -> bool {
        self.body
            .as_ref()
            .map_or(true, |body| body.kind() == self.id.kind())
    }

    /// Same server-visible content, ignoring the local `modified` flag
    pub fn same_content(&self, other: &Primitive) -> bool {
        self.id == other.id
            && self.version == other.version
            && self.body == other.body
            && self.tags == other.tags
            && self.timestamp == other.timestamp
    }
}
