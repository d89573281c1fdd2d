//! `PostgreSQL` implementation of the `StoryRepository` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pikfic_core::error::{PersistenceError, REMOTE_STORY_QUOTA};
use pikfic_core::identity::OwnerId;
use pikfic_core::language::Language;
use pikfic_story::domain::aggregates::{Episode, Sharing, Story, StoryRecord};
use pikfic_story::domain::cast::Cast;
use pikfic_story::domain::repository::{RemoteRepositories, StoryRepository};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

/// Postgres error code raised by the quota trigger.
const CHECK_VIOLATION: &str = "23514";

const SELECT_COLUMNS: &str = r#"
    id, owner_id, title, genre, premise, "cast", total_episodes, episodes,
    is_completed, language, hashtags, shared, featured, attribution, created_at
"#;

/// PostgreSQL-backed story repository scoped to one owner.
#[derive(Debug, Clone)]
pub struct PgStoryRepository {
    pool: PgPool,
    owner: OwnerId,
}

impl PgStoryRepository {
    /// Creates a repository that only sees `owner`'s stories.
    #[must_use]
    pub fn new(pool: PgPool, owner: OwnerId) -> Self {
        Self { pool, owner }
    }
}

fn unavailable(e: &sqlx::Error) -> PersistenceError {
    PersistenceError::Unavailable(e.to_string())
}

fn write_error(e: &sqlx::Error) -> PersistenceError {
    if let sqlx::Error::Database(db) = e
        && db.code().as_deref() == Some(CHECK_VIOLATION)
        && db.message().contains("story quota exceeded")
    {
        return PersistenceError::QuotaExceeded {
            limit: REMOTE_STORY_QUOTA,
        };
    }
    unavailable(e)
}

fn corrupt(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Corrupt(e.to_string())
}

fn story_from_row(row: &PgRow) -> Result<Story, PersistenceError> {
    let total_episodes: i32 = row.try_get("total_episodes").map_err(corrupt)?;
    let language: String = row.try_get("language").map_err(corrupt)?;
    let Json(cast): Json<Cast> = row.try_get("cast").map_err(corrupt)?;
    let Json(episodes): Json<Vec<Episode>> = row.try_get("episodes").map_err(corrupt)?;
    let hashtags: Option<Json<Vec<String>>> = row.try_get("hashtags").map_err(corrupt)?;
    let owner: String = row.try_get("owner_id").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;

    let record = StoryRecord {
        id: row.try_get("id").map_err(corrupt)?,
        title: row.try_get("title").map_err(corrupt)?,
        genre: row.try_get("genre").map_err(corrupt)?,
        premise: row.try_get("premise").map_err(corrupt)?,
        cast,
        total_episodes: u32::try_from(total_episodes).map_err(corrupt)?,
        episodes,
        is_completed: row.try_get("is_completed").map_err(corrupt)?,
        created_at,
        language: Language::from_code(&language)
            .ok_or_else(|| corrupt(format!("unknown language code {language:?}")))?,
        hashtags: hashtags.map(|Json(tags)| tags),
        sharing: Sharing {
            shared: row.try_get("shared").map_err(corrupt)?,
            featured: row.try_get("featured").map_err(corrupt)?,
            attribution: row.try_get("attribution").map_err(corrupt)?,
        },
        owner: Some(OwnerId::new(owner)),
    };
    Story::try_from(record).map_err(corrupt)
}

#[async_trait]
impl StoryRepository for PgStoryRepository {
    async fn list(&self) -> Result<Vec<Story>, PersistenceError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM stories WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(self.owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;

        rows.iter().map(story_from_row).collect()
    }

    async fn find(&self, story_id: Uuid) -> Result<Option<Story>, PersistenceError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM stories WHERE id = $1 AND owner_id = $2"
        ))
        .bind(story_id)
        .bind(self.owner.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;

        row.as_ref().map(story_from_row).transpose()
    }

    async fn upsert(&self, story: &Story) -> Result<(), PersistenceError> {
        let total_episodes = i32::try_from(story.total_episodes())
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        let result = sqlx::query(
            r#"
            INSERT INTO stories (
                id, owner_id, title, genre, premise, "cast", total_episodes, episodes,
                is_completed, language, hashtags, shared, featured, attribution, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                genre = EXCLUDED.genre,
                premise = EXCLUDED.premise,
                "cast" = EXCLUDED."cast",
                total_episodes = EXCLUDED.total_episodes,
                episodes = EXCLUDED.episodes,
                is_completed = EXCLUDED.is_completed,
                language = EXCLUDED.language,
                hashtags = EXCLUDED.hashtags,
                shared = EXCLUDED.shared,
                featured = EXCLUDED.featured,
                attribution = EXCLUDED.attribution,
                updated_at = NOW()
            WHERE stories.owner_id = EXCLUDED.owner_id
            "#,
        )
        .bind(story.id())
        .bind(self.owner.as_str())
        .bind(story.title())
        .bind(story.genre())
        .bind(story.premise())
        .bind(Json(story.cast()))
        .bind(total_episodes)
        .bind(Json(story.episodes()))
        .bind(story.is_completed())
        .bind(story.language().code())
        .bind(story.hashtags().map(Json))
        .bind(story.sharing().shared)
        .bind(story.sharing().featured)
        .bind(story.sharing().attribution.as_deref())
        .bind(story.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(&e))?;

        if result.rows_affected() == 0 {
            warn!(story_id = %story.id(), "story id belongs to another owner");
            return Err(PersistenceError::Rejected(format!(
                "story {} belongs to another owner",
                story.id()
            )));
        }
        debug!(story_id = %story.id(), owner = %self.owner, "story upserted");
        Ok(())
    }

    async fn remove(&self, story_id: Uuid) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM stories WHERE id = $1 AND owner_id = $2")
            .bind(story_id)
            .bind(self.owner.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| unavailable(&e))?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(story_id));
        }
        Ok(())
    }

    async fn mark_shared(&self, story_id: Uuid, attribution: &str) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE stories SET shared = TRUE, attribution = $3, updated_at = NOW() \
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(story_id)
        .bind(self.owner.as_str())
        .bind(attribution)
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(story_id));
        }
        Ok(())
    }
}

/// Hands out [`PgStoryRepository`] instances sharing one pool.
#[derive(Debug, Clone)]
pub struct PgStoryRepositories {
    pool: PgPool,
}

impl PgStoryRepositories {
    /// Creates a new `PgStoryRepositories`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RemoteRepositories for PgStoryRepositories {
    fn for_owner(&self, owner: &OwnerId) -> Arc<dyn StoryRepository> {
        Arc::new(PgStoryRepository::new(self.pool.clone(), owner.clone()))
    }
}
