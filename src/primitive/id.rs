//! Primitive identity: kind plus numeric id

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The three kinds of map primitive
///
/// Ordering is `Point < Line < Relation`, which is also the order in which
/// a multi-fetch requests them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Terminal primitive carrying coordinates
    Point,
    /// Ordered sequence of points
    Line,
    /// Ordered sequence of role-tagged members of any kind
    Relation,
}

impl Kind {
    /// All kinds, in fetch order
    pub const ALL: [Kind; 3] = [Kind::Point, Kind::Line, Kind::Relation];

    /// Name used on the wire (`node`, `way`, `relation`)
    pub fn wire_name(self) -> &'static str {
        match self {
            Kind::Point => "node",
            Kind::Line => "way",
            Kind::Relation => "relation",
        }
    }

    /// Plural wire name used by multi-fetch endpoints
    pub fn wire_plural(self) -> &'static str {
        match self {
            Kind::Point => "nodes",
            Kind::Line => "ways",
            Kind::Relation => "relations",
        }
    }

    /// Single-letter prefix used in the compact textual form (`n12`)
    pub fn prefix(self) -> char {
        match self {
            Kind::Point => 'n',
            Kind::Line => 'w',
            Kind::Relation => 'r',
        }
    }

    /// Parse a wire name
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "node" => Some(Kind::Point),
            "way" => Some(Kind::Line),
            "relation" => Some(Kind::Relation),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Typed primitive identifier
///
/// Equality, hashing and ordering use `(kind, id)` only. Positive ids are
/// assigned by the server; zero and negative ids belong to primitives created
/// locally that the server has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrimitiveId {
    kind: Kind,
    id: i64,
}

impl PrimitiveId {
    pub fn new(kind: Kind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn point(id: i64) -> Self {
        Self::new(Kind::Point, id)
    }

    pub fn line(id: i64) -> Self {
        Self::new(Kind::Line, id)
    }

    pub fn relation(id: i64) -> Self {
        Self::new(Kind::Relation, id)
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The numeric part of the id
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Whether this id was created locally and is unknown to the server
    pub fn is_new(&self) -> bool {
        self.id <= 0
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id)
    }
}

/// Error parsing a textual primitive id
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid primitive id '{0}' (expected e.g. n12, w10, r5 or way/10)")]
pub struct ParseIdError(String);

impl FromStr for PrimitiveId {
    type Err = ParseIdError;

    /// Accepts `n12`, `w10`, `r5` as well as `node/12`, `way/10`, `relation/5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError(s.to_string());
        let s = s.trim();

        let (kind, number) = match s.split_once('/') {
            Some((name, number)) => (Kind::from_wire_name(name).ok_or_else(err)?, number),
            None => {
                let mut chars = s.chars();
                let kind = match chars.next() {
                    Some('n') => Kind::Point,
                    Some('w') => Kind::Line,
                    Some('r') => Kind::Relation,
                    _ => return Err(err()),
                };
                (kind, chars.as_str())
            }
        };

        let id = number.parse::<i64>().map_err(|_| err())?;
        Ok(Self::new(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compact_form() {
        assert_eq!("n12".parse::<PrimitiveId>().unwrap(), PrimitiveId::point(12));
        assert_eq!("w10".parse::<PrimitiveId>().unwrap(), PrimitiveId::line(10));
        assert_eq!("r5".parse::<PrimitiveId>().unwrap(), PrimitiveId::relation(5));
    }

    #[test]
    fn test_parse_wire_form() {
        assert_eq!("way/10".parse::<PrimitiveId>().unwrap(), PrimitiveId::line(10));
        assert_eq!("node/-3".parse::<PrimitiveId>().unwrap(), PrimitiveId::point(-3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("x10".parse::<PrimitiveId>().is_err());
        assert!("w".parse::<PrimitiveId>().is_err());
        assert!("street/1".parse::<PrimitiveId>().is_err());
    }

    #[test]
    fn test_display_roundtrips() {
        let id = PrimitiveId::relation(42);
        assert_eq!(id.to_string(), "r42");
        assert_eq!(id.to_string().parse::<PrimitiveId>().unwrap(), id);
    }

    #[test]
    fn test_identity_is_kind_and_number() {
        assert_ne!(PrimitiveId::point(1), PrimitiveId::line(1));
        assert!(PrimitiveId::point(0).is_new());
        assert!(!PrimitiveId::point(7).is_new());
    }

    #[test]
    fn test_ordering_follows_fetch_order() {
        assert!(PrimitiveId::point(99) < PrimitiveId::line(1));
        assert!(PrimitiveId::line(99) < PrimitiveId::relation(1));
    }
}
