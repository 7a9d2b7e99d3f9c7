//! Structural payload of a complete primitive

use super::id::{Kind, PrimitiveId};
use serde::{Deserialize, Serialize};

/// WGS84 coordinate of a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A role-tagged reference from a relation to another primitive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub target: PrimitiveId,
    pub role: String,
}

impl Member {
    pub fn new(target: PrimitiveId, role: impl Into<String>) -> Self {
        Self {
            target,
            role: role.into(),
        }
    }
}

/// Body of a complete primitive, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Body {
    Point { coord: Coord },
    Line { points: Vec<i64> },
    Relation { members: Vec<Member> },
}

impl Body {
    pub fn kind(&self) -> Kind {
        match self {
            Body::Point { .. } => Kind::Point,
            Body::Line { .. } => Kind::Line,
            Body::Relation { .. } => Kind::Relation,
        }
    }

    /// Every primitive this body refers to, in order, duplicates included
    pub fn references(&self) -> Vec<PrimitiveId> {
        match self {
            Body::Point { .. } => Vec::new(),
            Body::Line { points } => points.iter().copied().map(PrimitiveId::point).collect(),
            Body::Relation { members } => members.iter().map(|m| m.target).collect(),
        }
    }
}
