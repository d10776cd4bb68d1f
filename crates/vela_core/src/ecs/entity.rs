//! # Entity Identifiers
//!
//! Entities are opaque integer ids - no inherent data, just membership in
//! the live set. Ids are totally ordered so the store can iterate them
//! deterministically.

use serde::{Deserialize, Serialize};

/// Unique identifier for an entity.
///
/// Allocated sequentially by [`crate::WorldStore::create_entity`], or
/// accepted explicitly (the allocator then advances past it so a later
/// automatic allocation never collides).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
