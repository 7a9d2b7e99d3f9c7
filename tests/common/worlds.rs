//! Remote worlds shared by the integration tests

use primfetch::{Coord, MemoryStore, MemoryTransport, Member, Primitive, PrimitiveId};

/// Points 1..=3 and line 10 over all three
pub fn complete_line_world() -> MemoryTransport {
    MemoryTransport::with_objects([
        Primitive::point(1, 1, Coord::new(52.50, 13.40)),
        Primitive::point(2, 1, Coord::new(52.51, 13.41)),
        Primitive::point(3, 1, Coord::new(52.52, 13.42)),
        Primitive::line(10, 1, vec![1, 2, 3]).with_tag("highway", "residential"),
    ])
}

/// Like [`complete_line_world`], but point 3 was deleted on the server
pub fn gap_line_world() -> MemoryTransport {
    let world = complete_line_world();
    world.remove(&PrimitiveId::point(3));
    world
}

/// Two lines sharing point 2, grouped by relation 5
pub fn relation_world() -> MemoryTransport {
    MemoryTransport::with_objects([
        Primitive::point(1, 1, Coord::new(48.10, 11.50)),
        Primitive::point(2, 1, Coord::new(48.11, 11.51)),
        Primitive::point(3, 1, Coord::new(48.12, 11.52)),
        Primitive::line(10, 2, vec![1, 2]),
        Primitive::line(11, 1, vec![2, 3]),
        Primitive::relation(
            5,
            1,
            vec![
                Member::new(PrimitiveId::line(10), "outer"),
                Member::new(PrimitiveId::line(11), "outer"),
            ],
        )
        .with_tag("type", "multipolygon"),
    ])
}

/// A permanent store that already knows line 10 and point 1
pub fn local_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(Primitive::point(1, 1, Coord::new(52.50, 13.40)));
    store.insert(Primitive::incomplete(PrimitiveId::point(2)));
    store.insert(Primitive::incomplete(PrimitiveId::point(3)));
    store.insert(Primitive::line(10, 1, vec![1, 2, 3]));
    store
}
