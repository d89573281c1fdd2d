//! Device-local story library.
//!
//! The whole library is one JSON document holding a keyed list, newest
//! first. Every write rewrites the file through a temporary sibling and a
//! rename, so readers never observe a half-written library.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pikfic_core::error::PersistenceError;
use pikfic_story::domain::aggregates::Story;
use pikfic_story::domain::repository::StoryRepository;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Default file name of the local library.
pub const DEFAULT_LIBRARY_FILE: &str = "pikfic_stories.json";

/// Current library file version.
const LIBRARY_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    version: u32,
    stories: Vec<Story>,
}

/// `StoryRepository` over a single JSON file.
#[derive(Debug)]
pub struct JsonFileStoryRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStoryRepository {
    /// Library stored at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the library file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<Story>, PersistenceError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::Unavailable(e.to_string())),
        };
        let file: LibraryFile = serde_json::from_slice(&bytes)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        if file.version != LIBRARY_VERSION {
            return Err(PersistenceError::Corrupt(format!(
                "library version mismatch: expected {LIBRARY_VERSION}, found {}",
                file.version
            )));
        }
        Ok(file.stories)
    }

    async fn write(&self, stories: Vec<Story>) -> Result<(), PersistenceError> {
        let file = LibraryFile {
            version: LIBRARY_VERSION,
            stories,
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json)
            .await
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        debug!(path = %self.path.display(), stories = file.stories.len(), "local library written");
        Ok(())
    }
}

#[async_trait]
impl StoryRepository for JsonFileStoryRepository {
    async fn list(&self) -> Result<Vec<Story>, PersistenceError> {
        self.read().await
    }

    async fn find(&self, story_id: Uuid) -> Result<Option<Story>, PersistenceError> {
        Ok(self
            .read()
            .await?
            .into_iter()
            .find(|story| story.id() == story_id))
    }

    async fn upsert(&self, story: &Story) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut stories = self.read().await?;
        match stories.iter_mut().find(|stored| stored.id() == story.id()) {
            Some(stored) => *stored = story.clone(),
            None => stories.insert(0, story.clone()),
        }
        self.write(stories).await
    }

    async fn remove(&self, story_id: Uuid) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut stories = self.read().await?;
        let before = stories.len();
        stories.retain(|story| story.id() != story_id);
        if stories.len() == before {
            return Err(PersistenceError::NotFound(story_id));
        }
        self.write(stories).await
    }

    async fn mark_shared(
        &self,
        _story_id: Uuid,
        _attribution: &str,
    ) -> Result<(), PersistenceError> {
        Err(PersistenceError::Rejected(
            "sharing requires the remote library".to_owned(),
        ))
    }
}
