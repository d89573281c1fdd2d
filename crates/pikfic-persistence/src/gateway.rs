//! Persistence gateway.
//!
//! Save, load, delete and flag stories through whichever backend the
//! selector picked. The remote quota is checked here against the set of ids
//! this gateway has seen in the remote library.

use std::collections::HashSet;
use std::sync::Arc;

use pikfic_core::error::{PersistenceError, REMOTE_STORY_QUOTA};
use pikfic_core::identity::OwnerId;
use pikfic_story::domain::aggregates::Story;
use pikfic_story::domain::repository::StoryRepository;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which backend a gateway writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageScope {
    /// Device-local library, no owner.
    Local,
    /// Remote library scoped to `owner`.
    Remote {
        /// Owner of every record written through this gateway.
        owner: OwnerId,
    },
}

/// What a `save` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new record was written.
    Inserted,
    /// An existing record was replaced.
    Updated,
    /// The stored record already matched; nothing was written.
    Unchanged,
}

impl SaveOutcome {
    /// Lower-case label for logs and API responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Result of copying a local library into the remote one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Stories written remotely.
    pub imported: Vec<Uuid>,
    /// Stories left behind, either already present or over quota.
    pub skipped: Vec<Uuid>,
    /// Stories the remote backend refused or could not decode.
    pub failed: Vec<Uuid>,
}

/// Backend-agnostic story storage for one session.
pub struct PersistenceGateway {
    repository: Arc<dyn StoryRepository>,
    scope: StorageScope,
    known_ids: Mutex<Option<HashSet<Uuid>>>,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Whether `stored` already holds this completed version of `story`.
fn same_completed_version(stored: &Story, story: &Story) -> bool {
    stored.episode_count() == story.episode_count()
        && stored.last_episode().map(|e| &e.content) == story.last_episode().map(|e| &e.content)
        && stored.hashtags() == story.hashtags()
}

impl PersistenceGateway {
    /// Creates a gateway over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn StoryRepository>, scope: StorageScope) -> Self {
        Self {
            repository,
            scope,
            known_ids: Mutex::new(None),
        }
    }

    /// Backend this gateway writes to.
    #[must_use]
    pub fn scope(&self) -> &StorageScope {
        &self.scope
    }

    /// Whether writes go to the remote library.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self.scope, StorageScope::Remote { .. })
    }

    /// Every story in scope, newest first.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the backend cannot be read.
    pub async fn library(&self) -> Result<Vec<Story>, PersistenceError> {
        let stories = self.repository.list().await?;
        *self.known_ids.lock().await = Some(stories.iter().map(Story::id).collect());
        Ok(stories)
    }

    /// The stored version of `story_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the backend cannot be read.
    pub async fn find(&self, story_id: Uuid) -> Result<Option<Story>, PersistenceError> {
        self.repository.find(story_id).await
    }

    /// Persists `story`.
    ///
    /// Remote writes are stamped with the gateway's owner. A completed story
    /// that is already stored remotely in the same version is not rewritten.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::QuotaExceeded` when a remote insert would
    /// take the owner past [`REMOTE_STORY_QUOTA`], or the backend's error.
    pub async fn save(&self, story: &Story) -> Result<SaveOutcome, PersistenceError> {
        let story = match &self.scope {
            StorageScope::Local => story.clone(),
            StorageScope::Remote { owner } => story.clone().with_owner(Some(owner.clone())),
        };
        let existing = self.repository.find(story.id()).await?;

        if self.is_remote()
            && story.is_completed()
            && let Some(stored) = &existing
            && same_completed_version(stored, &story)
        {
            debug!(story_id = %story.id(), "completed story already stored, skipping write");
            return Ok(SaveOutcome::Unchanged);
        }

        if existing.is_none() && self.is_remote() {
            let count = self.known_count().await?;
            if count >= REMOTE_STORY_QUOTA {
                warn!(story_id = %story.id(), count, "remote story quota reached");
                return Err(PersistenceError::QuotaExceeded {
                    limit: REMOTE_STORY_QUOTA,
                });
            }
        }

        self.repository.upsert(&story).await?;
        if let Some(known) = self.known_ids.lock().await.as_mut() {
            known.insert(story.id());
        }

        let outcome = if existing.is_some() {
            SaveOutcome::Updated
        } else {
            SaveOutcome::Inserted
        };
        info!(
            story_id = %story.id(),
            episodes = story.episode_count(),
            remote = self.is_remote(),
            outcome = outcome.as_str(),
            "story saved"
        );
        Ok(outcome)
    }

    /// Deletes `story_id`.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NotFound` if nothing is stored under that id.
    pub async fn delete(&self, story_id: Uuid) -> Result<(), PersistenceError> {
        self.repository.remove(story_id).await?;
        if let Some(known) = self.known_ids.lock().await.as_mut() {
            known.remove(&story_id);
        }
        info!(%story_id, remote = self.is_remote(), "story deleted");
        Ok(())
    }

    /// Flags `story_id` as shared under `attribution`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the local backend always refuses.
    pub async fn mark_shared(
        &self,
        story_id: Uuid,
        attribution: &str,
    ) -> Result<(), PersistenceError> {
        self.repository.mark_shared(story_id, attribution).await
    }

    /// Copies every story in `source` that is not already stored here.
    ///
    /// Stories are imported oldest first so the remote library keeps the
    /// local order. Once the quota is reached the rest are skipped. A story
    /// the backend refuses is reported as failed and the import moves on.
    /// The source is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Unavailable` if either backend cannot be
    /// reached, or the source's read error.
    pub async fn import_from(
        &self,
        source: &dyn StoryRepository,
    ) -> Result<ImportReport, PersistenceError> {
        let mut report = ImportReport::default();
        let mut stories = source.list().await?;
        stories.reverse();
        for story in stories {
            if self.repository.find(story.id()).await?.is_some() {
                report.skipped.push(story.id());
                continue;
            }
            match self.save(&story).await {
                Ok(_) => report.imported.push(story.id()),
                Err(e) if e.is_quota_exceeded() => report.skipped.push(story.id()),
                Err(e @ PersistenceError::Unavailable(_)) => return Err(e),
                Err(e) => {
                    warn!(story_id = %story.id(), error = %e, "story not imported");
                    report.failed.push(story.id());
                }
            }
        }
        info!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "library import finished"
        );
        Ok(report)
    }

    async fn known_count(&self) -> Result<usize, PersistenceError> {
        let mut known = self.known_ids.lock().await;
        if let Some(ids) = known.as_ref() {
            return Ok(ids.len());
        }
        let ids: HashSet<Uuid> = self.repository.list().await?.iter().map(Story::id).collect();
        let count = ids.len();
        *known = Some(ids);
        Ok(count)
    }
}
