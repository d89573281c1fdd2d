//! Test repositories — in-memory and failing `StoryRepository` implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pikfic_core::error::PersistenceError;
use pikfic_core::identity::OwnerId;
use pikfic_story::domain::aggregates::Story;
use pikfic_story::domain::repository::{RemoteRepositories, StoryRepository};
use uuid::Uuid;

/// A story repository backed by a `Vec`, newest first, that counts writes.
#[derive(Debug, Default)]
pub struct InMemoryStoryRepository {
    stories: Mutex<Vec<Story>>,
    writes: AtomicUsize,
    mark_shared_error: Mutex<Option<PersistenceError>>,
    rejected_upserts: Mutex<HashMap<Uuid, PersistenceError>>,
}

impl InMemoryStoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository preloaded with `stories`, kept in the given order.
    #[must_use]
    pub fn with_stories(stories: Vec<Story>) -> Self {
        Self {
            stories: Mutex::new(stories),
            ..Self::default()
        }
    }

    /// Number of successful `upsert` calls so far.
    pub fn upsert_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the stored stories.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stored(&self) -> Vec<Story> {
        self.stories.lock().unwrap().clone()
    }

    /// Makes every later `mark_shared` call fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_mark_shared(&self, error: PersistenceError) {
        *self.mark_shared_error.lock().unwrap() = Some(error);
    }

    /// Makes every later `upsert` of `story_id` fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reject_upsert_of(&self, story_id: Uuid, error: PersistenceError) {
        self.rejected_upserts.lock().unwrap().insert(story_id, error);
    }
}

#[async_trait]
impl StoryRepository for InMemoryStoryRepository {
    async fn list(&self) -> Result<Vec<Story>, PersistenceError> {
        Ok(self.stored())
    }

    async fn find(&self, story_id: Uuid) -> Result<Option<Story>, PersistenceError> {
        Ok(self
            .stories
            .lock()
            .unwrap()
            .iter()
            .find(|story| story.id() == story_id)
            .cloned())
    }

    async fn upsert(&self, story: &Story) -> Result<(), PersistenceError> {
        if let Some(error) = self.rejected_upserts.lock().unwrap().get(&story.id()).cloned() {
            return Err(error);
        }
        let mut stories = self.stories.lock().unwrap();
        match stories.iter_mut().find(|stored| stored.id() == story.id()) {
            Some(stored) => *stored = story.clone(),
            None => stories.insert(0, story.clone()),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, story_id: Uuid) -> Result<(), PersistenceError> {
        let mut stories = self.stories.lock().unwrap();
        let before = stories.len();
        stories.retain(|story| story.id() != story_id);
        if stories.len() == before {
            return Err(PersistenceError::NotFound(story_id));
        }
        Ok(())
    }

    async fn mark_shared(&self, story_id: Uuid, attribution: &str) -> Result<(), PersistenceError> {
        if let Some(error) = self.mark_shared_error.lock().unwrap().clone() {
            return Err(error);
        }
        let mut stories = self.stories.lock().unwrap();
        let story = stories
            .iter_mut()
            .find(|story| story.id() == story_id)
            .ok_or(PersistenceError::NotFound(story_id))?;
        story.mark_shared(attribution.to_owned());
        Ok(())
    }
}

/// A story repository that fails every call with the configured error.
#[derive(Debug)]
pub struct FailingStoryRepository(pub PersistenceError);

impl FailingStoryRepository {
    /// Fails with `PersistenceError::Unavailable`.
    #[must_use]
    pub fn unavailable() -> Self {
        Self(PersistenceError::Unavailable("connection refused".into()))
    }
}

#[async_trait]
impl StoryRepository for FailingStoryRepository {
    async fn list(&self) -> Result<Vec<Story>, PersistenceError> {
        Err(self.0.clone())
    }

    async fn find(&self, _story_id: Uuid) -> Result<Option<Story>, PersistenceError> {
        Err(self.0.clone())
    }

    async fn upsert(&self, _story: &Story) -> Result<(), PersistenceError> {
        Err(self.0.clone())
    }

    async fn remove(&self, _story_id: Uuid) -> Result<(), PersistenceError> {
        Err(self.0.clone())
    }

    async fn mark_shared(
        &self,
        _story_id: Uuid,
        _attribution: &str,
    ) -> Result<(), PersistenceError> {
        Err(self.0.clone())
    }
}

/// Remote backend double holding one in-memory repository per owner.
#[derive(Debug, Default)]
pub struct InMemoryRemoteRepositories {
    owners: Mutex<HashMap<OwnerId, Arc<InMemoryStoryRepository>>>,
}

impl InMemoryRemoteRepositories {
    /// Create a backend with no owners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The repository for `owner`, created on first use.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn repository(&self, owner: &OwnerId) -> Arc<InMemoryStoryRepository> {
        Arc::clone(
            self.owners
                .lock()
                .unwrap()
                .entry(owner.clone())
                .or_default(),
        )
    }
}

impl RemoteRepositories for InMemoryRemoteRepositories {
    fn for_owner(&self, owner: &OwnerId) -> Arc<dyn StoryRepository> {
        self.repository(owner)
    }
}
