//! Story identifier source.
//!
//! Identifiers are assigned once, when a story is drafted, and must survive
//! moving the story between backends unchanged.

use uuid::Uuid;

/// Produces globally unique story identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn next_id(&self) -> Uuid;
}

/// Production generator emitting time-ordered UUIDv7 values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeOrderedIds;

impl IdGenerator for TimeOrderedIds {
    fn next_id(&self) -> Uuid {
        Uuid::now_v7()
    }
}
