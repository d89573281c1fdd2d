//! The Story aggregate root.
//!
//! A story moves Draft → InProgress → Completed. The state is never stored
//! on its own; it is derived from the episode count, and `is_completed` is
//! recomputed on every append so the flag and the count cannot drift.

use chrono::{DateTime, Utc};
use pikfic_core::error::ValidationError;
use pikfic_core::identity::OwnerId;
use pikfic_core::language::Language;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cast::Cast;
use super::setup::StorySetup;

/// Lifecycle state of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryState {
    /// No episodes yet.
    Draft,
    /// At least one episode, fewer than the target.
    InProgress,
    /// Target reached. Absorbing.
    Completed,
}

impl StoryState {
    /// Lower-case label for logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
        }
    }
}

/// One generated installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// 1-based position in the story.
    pub number: u32,
    /// Narrative text.
    pub content: String,
    /// Offered continuations; three while the story is open.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Continuation text that produced this episode. `None` for episode 1.
    #[serde(default)]
    pub provenance: Option<String>,
}

/// A validated generation result, ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EpisodeDraft {
    /// Narrative text.
    pub content: String,
    /// Offered continuations.
    pub suggestions: Vec<String>,
    /// Title, when one was requested and returned.
    pub story_title: Option<String>,
    /// Hashtags, when they were requested and returned.
    pub hashtags: Option<Vec<String>>,
}

/// Public-pool metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sharing {
    /// Owner asked for the story to be listed publicly.
    pub shared: bool,
    /// Curated into the public pool. Set outside this system.
    pub featured: bool,
    /// Credit line chosen when sharing.
    pub attribution: Option<String>,
}

/// Storage shape of a story. Every backend reads and writes this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    /// Story identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Genre key.
    pub genre: String,
    /// Premise that seeded episode 1.
    pub premise: String,
    /// Characters.
    pub cast: Cast,
    /// Target episode count.
    pub total_episodes: u32,
    /// Episodes in order.
    pub episodes: Vec<Episode>,
    /// Stored completion flag. Re-derived on load.
    pub is_completed: bool,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Narrative language.
    #[serde(default)]
    pub language: Language,
    /// Hashtags, only meaningful once completed.
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
    /// Public-pool metadata.
    #[serde(default)]
    pub sharing: Sharing,
    /// Owning identity, if the record came from the remote backend.
    #[serde(default)]
    pub owner: Option<OwnerId>,
}

/// The aggregate root for one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoryRecord", into = "StoryRecord")]
pub struct Story {
    id: Uuid,
    title: String,
    genre: String,
    premise: String,
    cast: Cast,
    total_episodes: u32,
    episodes: Vec<Episode>,
    is_completed: bool,
    created_at: DateTime<Utc>,
    language: Language,
    hashtags: Option<Vec<String>>,
    sharing: Sharing,
    owner: Option<OwnerId>,
}

/// Strips a leading `#` and whitespace; drops tags that end up empty.
fn normalize_hashtags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().trim_start_matches('#').trim().to_owned())
        .filter(|tag| !tag.is_empty())
        .collect()
}

impl Story {
    /// Creates a Draft story from validated setup.
    ///
    /// The identifier is fixed here, before any generation call.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the setup is incomplete.
    pub fn draft(
        setup: &StorySetup,
        id: Uuid,
        created_at: DateTime<Utc>,
        owner: Option<OwnerId>,
    ) -> Result<Self, ValidationError> {
        let setup = setup.validate()?;
        let mut story = Self {
            id,
            title: String::new(),
            genre: setup.genre,
            premise: setup.premise,
            cast: setup.cast,
            total_episodes: setup.total_episodes,
            episodes: Vec::new(),
            is_completed: false,
            created_at,
            language: setup.language,
            hashtags: None,
            sharing: Sharing::default(),
            owner,
        };
        story.title = story.fallback_title();
        Ok(story)
    }

    /// Story identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Genre key.
    #[must_use]
    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Premise.
    #[must_use]
    pub fn premise(&self) -> &str {
        &self.premise
    }

    /// Characters.
    #[must_use]
    pub fn cast(&self) -> &Cast {
        &self.cast
    }

    /// Target episode count.
    #[must_use]
    pub fn total_episodes(&self) -> u32 {
        self.total_episodes
    }

    /// Episodes so far, in order.
    #[must_use]
    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    /// Whether the target episode count has been reached.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Creation instant.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Narrative language.
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    /// Hashtags. `None` until completed.
    #[must_use]
    pub fn hashtags(&self) -> Option<&[String]> {
        self.hashtags.as_deref()
    }

    /// Public-pool metadata.
    #[must_use]
    pub fn sharing(&self) -> &Sharing {
        &self.sharing
    }

    /// Owning identity, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&OwnerId> {
        self.owner.as_ref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StoryState {
        if self.episodes.is_empty() {
            StoryState::Draft
        } else if self.is_completed {
            StoryState::Completed
        } else {
            StoryState::InProgress
        }
    }

    /// Number of episodes written.
    #[must_use]
    pub fn episode_count(&self) -> u32 {
        u32::try_from(self.episodes.len()).unwrap_or(u32::MAX)
    }

    /// Number the next episode must carry.
    #[must_use]
    pub fn next_episode_number(&self) -> u32 {
        self.episode_count().saturating_add(1)
    }

    /// Most recent episode.
    #[must_use]
    pub fn last_episode(&self) -> Option<&Episode> {
        self.episodes.last()
    }

    /// `[lead X counterpart] genre`, used until the service supplies a title.
    #[must_use]
    pub fn fallback_title(&self) -> String {
        format!("[{}] {}", self.cast.pairing_label(), self.genre)
    }

    fn refuse(&self, operation: &'static str) -> ValidationError {
        ValidationError::InvalidTransition {
            story_id: self.id,
            state: self.state().as_str(),
            operation,
        }
    }

    /// Checks that `begin` is allowed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTransition` unless the story is a Draft.
    pub fn ensure_can_start(&self) -> Result<(), ValidationError> {
        match self.state() {
            StoryState::Draft => Ok(()),
            StoryState::InProgress | StoryState::Completed => Err(self.refuse("start")),
        }
    }

    /// Checks that `advance` is allowed and returns the episode being continued.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTransition` unless the story is InProgress.
    pub fn ensure_can_continue(&self) -> Result<&Episode, ValidationError> {
        match (self.state(), self.episodes.last()) {
            (StoryState::InProgress, Some(last)) => Ok(last),
            _ => Err(self.refuse("continue")),
        }
    }

    /// Applies the first generated episode.
    ///
    /// Takes the returned title when there is a non-blank one, otherwise keeps
    /// the fallback title.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTransition` unless the story is a Draft.
    pub fn begin(&mut self, draft: EpisodeDraft) -> Result<(), ValidationError> {
        self.ensure_can_start()?;
        if let Some(title) = draft.story_title.as_deref().map(str::trim)
            && !title.is_empty()
        {
            title.clone_into(&mut self.title);
        }
        self.push_episode(draft, None);
        Ok(())
    }

    /// Applies a continuation episode caused by `choice`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTransition` unless the story is InProgress.
    pub fn advance(&mut self, draft: EpisodeDraft, choice: &str) -> Result<(), ValidationError> {
        self.ensure_can_continue()?;
        self.push_episode(draft, Some(choice.to_owned()));
        Ok(())
    }

    fn push_episode(&mut self, draft: EpisodeDraft, provenance: Option<String>) {
        let number = self.next_episode_number();
        self.episodes.push(Episode {
            number,
            content: draft.content,
            suggestions: draft.suggestions,
            provenance,
        });
        self.is_completed = self.episode_count() >= self.total_episodes;
        if self.is_completed {
            self.hashtags = draft.hashtags.map(normalize_hashtags);
        }
    }

    /// Records that the owner shared this story under `attribution`.
    pub fn mark_shared(&mut self, attribution: String) {
        self.sharing.shared = true;
        self.sharing.attribution = Some(attribution);
    }

    /// Rebinds the story to a new owner, keeping its identifier.
    #[must_use]
    pub fn with_owner(mut self, owner: Option<OwnerId>) -> Self {
        self.owner = owner;
        self
    }
}

impl TryFrom<StoryRecord> for Story {
    type Error = ValidationError;

    fn try_from(record: StoryRecord) -> Result<Self, Self::Error> {
        if record.total_episodes == 0 {
            return Err(ValidationError::InvalidRecord(format!(
                "story {} has a non-positive episode target",
                record.id
            )));
        }
        let count = record.episodes.len();
        if count > record.total_episodes as usize {
            return Err(ValidationError::InvalidRecord(format!(
                "story {} has {count} episodes but a target of {}",
                record.id, record.total_episodes
            )));
        }
        for (index, episode) in record.episodes.iter().enumerate() {
            if episode.number as usize != index + 1 {
                return Err(ValidationError::InvalidRecord(format!(
                    "story {} has episode {} at position {}",
                    record.id,
                    episode.number,
                    index + 1
                )));
            }
        }

        let is_completed = count >= record.total_episodes as usize;
        if is_completed != record.is_completed {
            tracing::warn!(
                story_id = %record.id,
                stored = record.is_completed,
                derived = is_completed,
                "completion flag disagreed with episode count; using derived value"
            );
        }

        Ok(Self {
            id: record.id,
            title: record.title,
            genre: record.genre,
            premise: record.premise,
            cast: record.cast,
            total_episodes: record.total_episodes,
            episodes: record.episodes,
            is_completed,
            created_at: record.created_at,
            language: record.language,
            hashtags: if is_completed { record.hashtags } else { None },
            sharing: record.sharing,
            owner: record.owner,
        })
    }
}

impl From<Story> for StoryRecord {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            title: story.title,
            genre: story.genre,
            premise: story.premise,
            cast: story.cast,
            total_episodes: story.total_episodes,
            episodes: story.episodes,
            is_completed: story.is_completed,
            created_at: story.created_at,
            language: story.language,
            hashtags: story.hashtags,
            sharing: story.sharing,
            owner: story.owner,
        }
    }
}
