//! Query handlers for the story library.
//!
//! Read-only views over whichever backend the gateway was opened on.

use chrono::{DateTime, Utc};
use pikfic_core::error::{PersistenceError, StoryError};
use pikfic_core::language::Language;
use pikfic_persistence::gateway::PersistenceGateway;
use pikfic_story::domain::aggregates::Story;
use serde::Serialize;
use uuid::Uuid;

/// One row of the library list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorySummary {
    /// The story identifier.
    pub id: Uuid,
    /// Display title. The cast-and-genre fallback until episode 1 supplies one.
    pub title: String,
    /// Pairing line, e.g. `Min X Jae`.
    pub cast_line: String,
    /// Genre key from the setup.
    pub genre: String,
    /// Episodes written so far.
    pub episode_count: u32,
    /// Planned length of the story.
    pub total_episodes: u32,
    /// Whether the final episode has been written.
    pub is_completed: bool,
    /// Whether the story is in the shared gallery.
    pub shared: bool,
    /// Narrative language.
    pub language: Language,
    /// When the story was drafted.
    pub created_at: DateTime<Utc>,
}

impl From<&Story> for StorySummary {
    fn from(story: &Story) -> Self {
        Self {
            id: story.id(),
            title: story.title().to_owned(),
            cast_line: story.cast().pairing_label(),
            genre: story.genre().to_owned(),
            episode_count: story.episode_count(),
            total_episodes: story.total_episodes(),
            is_completed: story.is_completed(),
            shared: story.sharing().shared,
            language: story.language(),
            created_at: story.created_at(),
        }
    }
}

/// Lists the library, newest first.
///
/// # Errors
///
/// Returns `StoryError::Persistence` if the backend cannot be read.
pub async fn list_library(gateway: &PersistenceGateway) -> Result<Vec<StorySummary>, StoryError> {
    let stories = gateway.library().await?;
    Ok(stories.iter().map(StorySummary::from).collect())
}

/// Retrieves one stored story.
///
/// # Errors
///
/// Returns `PersistenceError::NotFound` if no story has the ID.
pub async fn get_story(gateway: &PersistenceGateway, story_id: Uuid) -> Result<Story, StoryError> {
    gateway
        .find(story_id)
        .await?
        .ok_or(StoryError::Persistence(PersistenceError::NotFound(story_id)))
}
