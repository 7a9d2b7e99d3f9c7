//! Identity registry: resolves requested ids against the permanent store

use crate::primitive::{Primitive, PrimitiveId};
use crate::store::PermanentStore;

/// Read-only view of the permanent store used while building a request
pub struct IdentityRegistry<'a> {
    store: &'a dyn PermanentStore,
}

impl<'a> IdentityRegistry<'a> {
    pub fn new(store: &'a dyn PermanentStore) -> Self {
        Self { store }
    }

    /// The locally known primitive for `id`, if any.
    ///
    /// A failing lookup is logged and treated as absence: the id is then
    /// simply requested from the server with a bare placeholder.
    pub fn resolve(&self, id: &PrimitiveId) -> Option<Primitive> {
        match self.store.lookup(id) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%id, error = %e, "store lookup failed, treating as unknown");
                None
            }
        }
    }

    /// The primitive that names `id` in a multi-fetch: the local copy when
    /// one exists, otherwise an incomplete placeholder of the right kind.
    pub fn reference_for(&self, id: PrimitiveId) -> Primitive {
        self.resolve(&id).unwrap_or_else(|| Primitive::incomplete(id))
    }
}
