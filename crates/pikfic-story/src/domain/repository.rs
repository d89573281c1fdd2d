//! Storage ports.
//!
//! One interface, two implementations: a device-local keyed list and an
//! owner-scoped remote store. Which one a session uses is decided once, from
//! the identity signal, by the persistence layer.

use std::sync::Arc;

use async_trait::async_trait;
use pikfic_core::error::PersistenceError;
use pikfic_core::identity::OwnerId;
use uuid::Uuid;

use super::aggregates::Story;

/// Keyed story storage for a single scope (one device, or one owner).
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// All stories in scope, newest first.
    async fn list(&self) -> Result<Vec<Story>, PersistenceError>;

    /// The stored version of `story_id`, if any.
    async fn find(&self, story_id: Uuid) -> Result<Option<Story>, PersistenceError>;

    /// Inserts or fully replaces the story keyed by its identifier.
    async fn upsert(&self, story: &Story) -> Result<(), PersistenceError>;

    /// Deletes `story_id`. Returns `PersistenceError::NotFound` if absent.
    async fn remove(&self, story_id: Uuid) -> Result<(), PersistenceError>;

    /// Flags `story_id` as shared with the given credit line.
    async fn mark_shared(&self, story_id: Uuid, attribution: &str)
    -> Result<(), PersistenceError>;
}

/// Hands out remote repositories scoped to one owner.
pub trait RemoteRepositories: Send + Sync {
    /// Repository holding only `owner`'s stories.
    fn for_owner(&self, owner: &OwnerId) -> Arc<dyn StoryRepository>;
}
