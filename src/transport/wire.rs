//! OSM API 0.6 JSON document model
//!
//! ```json
//! {"version": "0.6", "elements": [
//!   {"type": "node", "id": 1, "version": 3, "lat": 51.5, "lon": -0.1, "tags": {}},
//!   {"type": "way", "id": 10, "version": 1, "nodes": [1, 2, 3]},
//!   {"type": "relation", "id": 5, "version": 2,
//!    "members": [{"type": "way", "ref": 10, "role": "outer"}]}
//! ]}
//! ```

use super::TransferError;
use crate::primitive::{Body, Coord, Kind, Member, Primitive, PrimitiveId, Tags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "0.6";

/// A response document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsmDocument {
    #[serde(default = "api_version")]
    pub version: String,
    #[serde(default)]
    pub elements: Vec<Element>,
}

fn api_version() -> String {
    API_VERSION.to_string()
}

/// Fields shared by every element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementMeta {
    pub id: i64,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    /// `false` for deleted elements, which carry no body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl ElementMeta {
    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true)
    }
}

/// One element of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node {
        #[serde(flatten)]
        meta: ElementMeta,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lon: Option<f64>,
    },
    Way {
        #[serde(flatten)]
        meta: ElementMeta,
        #[serde(default)]
        nodes: Vec<i64>,
    },
    Relation {
        #[serde(flatten)]
        meta: ElementMeta,
        #[serde(default)]
        members: Vec<WireMember>,
    },
}

/// Relation member as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMember {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub id: i64,
    #[serde(default)]
    pub role: String,
}

impl OsmDocument {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            version: api_version(),
            elements,
        }
    }

    /// Parse a JSON document
    pub fn from_json(text: &str) -> Result<Self, TransferError> {
        serde_json::from_str(text).map_err(|e| TransferError::Malformed(e.to_string()))
    }

    /// Ids of the deleted elements in the document
    pub fn deleted(&self) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.elements
            .iter()
            .filter(|e| !e.meta().is_visible())
            .map(Element::id)
    }

    /// Convert every visible element, failing on the first malformed one.
    /// Deleted elements are skipped.
    pub fn into_primitives(self) -> Result<Vec<Primitive>, TransferError> {
        self.elements
            .into_iter()
            .filter(|e| e.meta().is_visible())
            .map(Primitive::try_from)
            .collect()
    }
}

impl Element {
    pub fn meta(&self) -> &ElementMeta {
        match self {
            Element::Node { meta, .. }
            | Element::Way { meta, .. }
            | Element::Relation { meta, .. } => meta,
        }
    }

    pub fn id(&self) -> PrimitiveId {
        let kind = match self {
            Element::Node { .. } => Kind::Point,
            Element::Way { .. } => Kind::Line,
            Element::Relation { .. } => Kind::Relation,
        };
        PrimitiveId::new(kind, self.meta().id)
    }
}

impl TryFrom<Element> for Primitive {
    type Error = TransferError;

    fn try_from(element: Element) -> Result<Self, Self::Error> {
        if !element.meta().is_visible() {
            return Err(TransferError::Malformed(format!(
                "{} is deleted and has no body",
                element.id()
            )));
        }
        let (meta, primitive) = match element {
            Element::Node { meta, lat, lon } => {
                let (Some(lat), Some(lon)) = (lat, lon) else {
                    return Err(TransferError::Malformed(format!(
                        "node {} has no coordinates",
                        meta.id
                    )));
                };
                let primitive = Primitive::point(meta.id, meta.version, Coord::new(lat, lon));
                (meta, primitive)
            }
            Element::Way { meta, nodes } => {
                let primitive = Primitive::line(meta.id, meta.version, nodes);
                (meta, primitive)
            }
            Element::Relation { meta, members } => {
                let members = members
                    .into_iter()
                    .map(|m| {
                        let kind = Kind::from_wire_name(&m.kind).ok_or_else(|| {
                            TransferError::Malformed(format!(
                                "relation {} has member of unknown type '{}'",
                                meta.id, m.kind
                            ))
                        })?;
                        Ok(Member::new(PrimitiveId::new(kind, m.id), m.role))
                    })
                    .collect::<Result<Vec<_>, TransferError>>()?;
                let primitive = Primitive::relation(meta.id, meta.version, members);
                (meta, primitive)
            }
        };

        let mut primitive = primitive;
        primitive.tags = meta.tags;
        primitive.timestamp = meta.timestamp;
        Ok(primitive)
    }
}

/// Encode a complete primitive. Incomplete primitives have no wire form.
pub fn encode(primitive: &Primitive) -> Option<Element> {
    let meta = ElementMeta {
        id: primitive.id().id(),
        version: primitive.version,
        timestamp: primitive.timestamp,
        tags: primitive.tags.clone(),
        visible: None,
    };
    let element = match primitive.body()? {
        Body::Point { coord } => Element::Node {
            meta,
            lat: Some(coord.lat),
            lon: Some(coord.lon),
        },
        Body::Line { points } => Element::Way {
            meta,
            nodes: points.clone(),
        },
        Body::Relation { members } => Element::Relation {
            meta,
            members: members
                .iter()
                .map(|m| WireMember {
                    kind: m.target.kind().wire_name().to_string(),
                    id: m.target.id(),
                    role: m.role.clone(),
                })
                .collect(),
        },
    };
    Some(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "0.6",
        "generator": "test",
        "elements": [
            {"type": "node", "id": 1, "version": 3, "lat": 51.5, "lon": -0.1,
             "timestamp": "2023-05-01T10:00:00Z", "tags": {"amenity": "cafe"}},
            {"type": "way", "id": 10, "version": 1, "nodes": [1, 2, 3]},
            {"type": "relation", "id": 5, "version": 2,
             "members": [{"type": "way", "ref": 10, "role": "outer"},
                         {"type": "node", "ref": 1, "role": ""}]}
        ]
    }"#;

    #[test]
    fn test_decode_sample_document() {
        let primitives = OsmDocument::from_json(SAMPLE)
            .unwrap()
            .into_primitives()
            .unwrap();
        assert_eq!(primitives.len(), 3);

        let node = &primitives[0];
        assert_eq!(node.id(), PrimitiveId::point(1));
        assert_eq!(node.coord(), Some(Coord::new(51.5, -0.1)));
        assert_eq!(node.tags.get("amenity").map(String::as_str), Some("cafe"));
        assert!(node.timestamp.is_some());

        assert_eq!(primitives[1].line_points(), Some(&[1, 2, 3][..]));

        let members = primitives[2].relation_members().unwrap();
        assert_eq!(members[0], Member::new(PrimitiveId::line(10), "outer"));
        assert_eq!(members[1].target, PrimitiveId::point(1));
    }

    const WITH_DELETED: &str = r#"{"elements": [
        {"type": "node", "id": 1, "version": 3, "lat": 51.5, "lon": -0.1},
        {"type": "node", "id": 7, "version": 2, "visible": false},
        {"type": "way", "id": 10, "version": 3, "visible": false},
        {"type": "relation", "id": 5, "version": 4, "visible": false}
    ]}"#;

    #[test]
    fn test_deleted_elements_are_skipped() {
        let document = OsmDocument::from_json(WITH_DELETED).unwrap();
        assert_eq!(
            document.deleted().collect::<Vec<_>>(),
            vec![PrimitiveId::point(7), PrimitiveId::line(10), PrimitiveId::relation(5)]
        );

        let primitives = document.into_primitives().unwrap();
        assert_eq!(primitives.len(), 1);
        assert_eq!(primitives[0].id(), PrimitiveId::point(1));
    }

    #[test]
    fn test_deleted_way_never_becomes_an_empty_line() {
        let document = OsmDocument::from_json(WITH_DELETED).unwrap();
        let way = document.elements[2].clone();
        assert_eq!(way.id(), PrimitiveId::line(10));
        assert!(matches!(Primitive::try_from(way), Err(TransferError::Malformed(_))));
    }

    #[test]
    fn test_visible_node_without_coordinates_is_malformed() {
        let text = r#"{"elements": [{"type": "node", "id": 7, "version": 2}]}"#;
        let err = OsmDocument::from_json(text)
            .unwrap()
            .into_primitives()
            .unwrap_err();
        assert!(matches!(err, TransferError::Malformed(_)));
    }

    #[test]
    fn test_unknown_member_type_is_malformed() {
        let text = r#"{"elements": [{"type": "relation", "id": 5,
            "members": [{"type": "changeset", "ref": 1, "role": ""}]}]}"#;
        let result = OsmDocument::from_json(text).unwrap().into_primitives();
        assert!(result.is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            OsmDocument::from_json("<osm/>"),
            Err(TransferError::Malformed(_))
        ));
    }

    #[test]
    fn test_encode_matches_decode() {
        let primitives = OsmDocument::from_json(SAMPLE)
            .unwrap()
            .into_primitives()
            .unwrap();
        let encoded: Vec<Element> = primitives.iter().filter_map(encode).collect();
        let decoded = OsmDocument::new(encoded).into_primitives().unwrap();
        assert_eq!(decoded, primitives);
    }

    #[test]
    fn test_incomplete_has_no_wire_form() {
        assert!(encode(&Primitive::incomplete(PrimitiveId::line(3))).is_none());
    }
}
