//! Live story orchestration.
//!
//! Every mutating operation holds the session's busy flag for its whole
//! duration. Work happens on a copy of the story that replaces the live one
//! only after every step succeeded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pikfic_core::clock::Clock;
use pikfic_core::error::{PersistenceError, StoryError, ValidationError};
use pikfic_core::id::IdGenerator;
use pikfic_core::identity::Identity;
use pikfic_core::language::Language;
use pikfic_generation::client::GenerationClient;
use pikfic_generation::prompt::{self, GenerationRequest};
use pikfic_persistence::gateway::{PersistenceGateway, SaveOutcome};
use pikfic_persistence::sharing::{AttributionChoice, SharingGate};
use pikfic_story::domain::aggregates::Story;
use pikfic_story::domain::setup::StorySetup;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Observer handed the advisory prose of a streaming turn.
pub type StreamObserver<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Result of a successful start or continue.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The story after the new episode.
    pub story: Story,
    /// Result of the automatic save, present when this turn completed the
    /// story. A failed auto-save does not undo the turn.
    pub autosave: Option<Result<SaveOutcome, PersistenceError>>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One live story and the clients it is driven through.
pub struct StorySession {
    story_id: Uuid,
    language: Language,
    story: RwLock<Story>,
    busy: AtomicBool,
    persisted: AtomicBool,
    generator: GenerationClient,
    gateway: Arc<PersistenceGateway>,
    sharing: SharingGate,
    identity: Option<Identity>,
}

impl std::fmt::Debug for StorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorySession")
            .field("story_id", &self.story_id)
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl StorySession {
    /// Drafts a new story from `setup`. No generation happens yet.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Validation` if the setup is incomplete.
    pub fn create(
        setup: &StorySetup,
        identity: Option<Identity>,
        generator: GenerationClient,
        gateway: Arc<PersistenceGateway>,
        clock: &dyn Clock,
        ids: &dyn IdGenerator,
    ) -> Result<Self, StoryError> {
        let owner = identity.as_ref().map(|identity| identity.owner_id.clone());
        let story = Story::draft(setup, ids.next_id(), clock.now(), owner)?;
        info!(story_id = %story.id(), total = story.total_episodes(), "story drafted");
        Ok(Self::new(story, identity, generator, gateway, false))
    }

    /// Wraps a stored story in a live session.
    #[must_use]
    pub fn resume(
        story: Story,
        identity: Option<Identity>,
        generator: GenerationClient,
        gateway: Arc<PersistenceGateway>,
    ) -> Self {
        Self::new(story, identity, generator, gateway, true)
    }

    fn new(
        story: Story,
        identity: Option<Identity>,
        generator: GenerationClient,
        gateway: Arc<PersistenceGateway>,
        persisted: bool,
    ) -> Self {
        Self {
            story_id: story.id(),
            language: story.language(),
            story: RwLock::new(story),
            busy: AtomicBool::new(false),
            persisted: AtomicBool::new(persisted),
            generator,
            sharing: SharingGate::new(Arc::clone(&gateway)),
            gateway,
            identity,
        }
    }

    /// Story identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.story_id
    }

    /// Narrative language, used to localize error messages.
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    /// Whether an operation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether the live story matches the last stored copy.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted.load(Ordering::Acquire)
    }

    /// Copy of the current story.
    pub async fn snapshot(&self) -> Story {
        self.story.read().await.clone()
    }

    /// Generates episode 1 from the premise.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Busy` if another operation is in flight,
    /// `StoryError::Validation` unless the story is a Draft, and
    /// `StoryError::Generation` if the service fails. The story is unchanged
    /// on any error.
    pub async fn start(&self) -> Result<TurnOutcome, StoryError> {
        self.turn(None, None).await
    }

    /// Like [`start`](Self::start), reporting advisory prose as it streams.
    ///
    /// # Errors
    ///
    /// As for [`start`](Self::start).
    pub async fn start_streaming(
        &self,
        observer: StreamObserver<'_>,
    ) -> Result<TurnOutcome, StoryError> {
        self.turn(None, Some(observer)).await
    }

    /// Generates the next episode from the chosen continuation.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Busy` if another operation is in flight,
    /// `StoryError::Validation` for a blank choice or a story that is not in
    /// progress, and `StoryError::Generation` if the service fails. The story
    /// is unchanged on any error.
    pub async fn continue_with(&self, choice: &str) -> Result<TurnOutcome, StoryError> {
        self.turn(Some(choice), None).await
    }

    /// Like [`continue_with`](Self::continue_with), reporting advisory prose
    /// as it streams.
    ///
    /// # Errors
    ///
    /// As for [`continue_with`](Self::continue_with).
    pub async fn continue_streaming(
        &self,
        choice: &str,
        observer: StreamObserver<'_>,
    ) -> Result<TurnOutcome, StoryError> {
        self.turn(Some(choice), Some(observer)).await
    }

    /// Saves the current story to the active backend.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Busy` or `StoryError::Persistence`.
    pub async fn save(&self) -> Result<SaveOutcome, StoryError> {
        let _guard = self.acquire()?;
        let story = self.snapshot().await;
        let outcome = self.gateway.save(&story).await?;
        self.persisted.store(true, Ordering::Release);
        Ok(outcome)
    }

    /// Deletes the story from the active backend.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Validation` when `confirmed` is false,
    /// `StoryError::Busy`, or `StoryError::Persistence`.
    pub async fn delete(&self, confirmed: bool) -> Result<(), StoryError> {
        let _guard = self.acquire()?;
        if !confirmed {
            return Err(ValidationError::DeletionUnconfirmed(self.story_id).into());
        }
        self.gateway.delete(self.story_id).await?;
        Ok(())
    }

    /// Shares the completed story under the chosen attribution.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Busy` or `StoryError::Share`.
    pub async fn share(&self, choice: AttributionChoice) -> Result<Story, StoryError> {
        let _guard = self.acquire()?;
        let story = self.snapshot().await;
        let shared = self
            .sharing
            .share(&story, self.identity.as_ref(), choice)
            .await?;
        *self.story.write().await = shared.clone();
        Ok(shared)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, StoryError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StoryError::Busy(self.story_id))?;
        Ok(BusyGuard(&self.busy))
    }

    fn request_for(story: &Story, choice: Option<&str>) -> Result<GenerationRequest, ValidationError> {
        match choice {
            None => {
                story.ensure_can_start()?;
                prompt::build_request(story, story.premise(), 1)
            }
            Some(choice) => {
                story.ensure_can_continue()?;
                if choice.trim().is_empty() {
                    return Err(ValidationError::MissingField("choice"));
                }
                prompt::build_request(story, choice.trim(), story.next_episode_number())
            }
        }
    }

    async fn turn(
        &self,
        choice: Option<&str>,
        observer: Option<StreamObserver<'_>>,
    ) -> Result<TurnOutcome, StoryError> {
        let _guard = self.acquire()?;
        let mut next = self.snapshot().await;
        let request = Self::request_for(&next, choice)?;

        let draft = match observer {
            Some(observer) => self.generator.generate_streaming(&request, observer).await?,
            None => self.generator.generate(&request).await?,
        };
        match choice {
            None => next.begin(draft)?,
            Some(choice) => next.advance(draft, choice.trim())?,
        }

        let autosave = if next.is_completed() {
            let result = self.gateway.save(&next).await;
            if let Err(e) = &result {
                warn!(story_id = %self.story_id, error = %e, "automatic save failed");
            }
            Some(result)
        } else {
            None
        };

        info!(
            story_id = %self.story_id,
            episode = request.episode_number,
            completed = next.is_completed(),
            "episode appended"
        );
        *self.story.write().await = next.clone();
        self.persisted
            .store(matches!(autosave, Some(Ok(_))), Ordering::Release);
        Ok(TurnOutcome {
            story: next,
            autosave,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pikfic_core::error::{GenerationError, ShareError};
    use pikfic_persistence::gateway::StorageScope;
    use pikfic_story::domain::aggregates::StoryState;
    use pikfic_test_support::{
        FailingStoryRepository, FixedClock, GatedTextService, InMemoryStoryRepository,
        ScriptedTextService,
        SequentialIds, closing_episode_json, episode_json, opening_episode_json, sample_identity,
        sample_setup,
    };

    struct Harness {
        session: StorySession,
        service: Arc<ScriptedTextService>,
        repository: Arc<InMemoryStoryRepository>,
    }

    fn harness(
        total: u32,
        replies: Vec<Result<String, GenerationError>>,
        identity: Option<Identity>,
    ) -> Harness {
        let service = Arc::new(ScriptedTextService::new(replies));
        let repository = Arc::new(InMemoryStoryRepository::new());
        let scope = match &identity {
            Some(identity) => StorageScope::Remote {
                owner: identity.owner_id.clone(),
            },
            None => StorageScope::Local,
        };
        let gateway = Arc::new(PersistenceGateway::new(repository.clone(), scope));
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        let session = StorySession::create(
            &sample_setup(total),
            identity,
            GenerationClient::new(service.clone()),
            gateway,
            &clock,
            &SequentialIds::new(),
        )
        .unwrap();
        Harness {
            session,
            service,
            repository,
        }
    }

    fn full_run(total: u32) -> Vec<Result<String, GenerationError>> {
        let mut replies = vec![Ok(opening_episode_json("Episode one.", "Finals"))];
        for n in 2..total {
            replies.push(Ok(episode_json(&format!("Episode {n}."))));
        }
        if total > 1 {
            replies.push(Ok(closing_episode_json("The end.")));
        }
        replies
    }

    #[tokio::test]
    async fn test_ten_episode_story_completes_on_ninth_continue() {
        // Arrange
        let h = harness(10, full_run(10), None);
        h.session.start().await.unwrap();

        // Act
        for _ in 0..8 {
            let outcome = h.session.continue_with("Leave a note").await.unwrap();
            assert!(!outcome.story.is_completed());
            assert!(outcome.autosave.is_none());
        }
        let last = h.session.continue_with("Ask directly").await.unwrap();

        // Assert
        assert!(last.story.is_completed());
        assert_eq!(last.story.episode_count(), 10);
        assert_eq!(last.autosave, Some(Ok(SaveOutcome::Inserted)));
        assert_eq!(
            last.story.hashtags(),
            Some(&["finals".to_owned(), "rain".to_owned(), "carrel".to_owned()][..])
        );
        let err = h.session.continue_with("More").await.unwrap_err();
        assert!(matches!(
            err,
            StoryError::Validation(ValidationError::InvalidTransition { .. })
        ));
        assert_eq!(h.session.snapshot().await.state(), StoryState::Completed);
    }

    #[tokio::test]
    async fn test_start_takes_generated_title_and_records_first_request() {
        let h = harness(3, full_run(3), None);

        let outcome = h.session.start().await.unwrap();

        assert_eq!(outcome.story.title(), "Finals");
        assert_eq!(outcome.story.state(), StoryState::InProgress);
        let requests = h.service.requests();
        assert_eq!(requests[0].user_prompt, sample_setup(3).premise);
        assert!(requests[0].expects.title);
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_story_untouched() {
        // Arrange
        let replies = vec![
            Ok(opening_episode_json("Episode one.", "Finals")),
            Ok(r#"{"content":"half"}"#.to_owned()),
        ];
        let h = harness(5, replies, None);
        h.session.start().await.unwrap();
        let before = h.session.snapshot().await;

        // Act
        let err = h.session.continue_with("Leave a note").await.unwrap_err();

        // Assert
        assert!(matches!(err, StoryError::Generation(_)));
        assert_eq!(h.session.snapshot().await, before);
        assert!(!h.session.is_busy());
    }

    #[tokio::test]
    async fn test_failed_start_stays_draft() {
        let h = harness(5, vec![Err(GenerationError::EmptyResponse)], None);

        let err = h.session.start().await.unwrap_err();

        assert_eq!(err, StoryError::Generation(GenerationError::EmptyResponse));
        assert_eq!(h.session.snapshot().await.state(), StoryState::Draft);
    }

    #[tokio::test]
    async fn test_blank_choice_is_rejected_before_generation() {
        let h = harness(5, full_run(5), None);
        h.session.start().await.unwrap();

        let err = h.session.continue_with("   ").await.unwrap_err();

        assert_eq!(
            err,
            StoryError::Validation(ValidationError::MissingField("choice"))
        );
        assert_eq!(h.service.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_streaming_continue_reports_advisory_text() {
        let h = harness(5, full_run(5), None);
        h.session.start().await.unwrap();
        let mut seen = Vec::new();

        let outcome = h
            .session
            .continue_streaming("Leave a note", &mut |text| seen.push(text.to_owned()))
            .await
            .unwrap();

        assert_eq!(outcome.story.last_episode().unwrap().content, "Episode 2.");
        assert_eq!(seen.last().map(String::as_str), Some("Episode 2."));
        assert_eq!(
            outcome.story.last_episode().unwrap().provenance.as_deref(),
            Some("Leave a note")
        );
    }

    #[tokio::test]
    async fn test_busy_session_rejects_second_operation() {
        let h = harness(5, full_run(5), None);
        let _held = h.session.acquire().unwrap();

        let err = h.session.start().await.unwrap_err();

        assert_eq!(err, StoryError::Busy(h.session.id()));
    }

    #[tokio::test]
    async fn test_operations_during_generation_are_rejected_as_busy() {
        // Arrange
        let service = Arc::new(GatedTextService::new(full_run(3)));
        let repository = Arc::new(InMemoryStoryRepository::new());
        let gateway = Arc::new(PersistenceGateway::new(repository.clone(), StorageScope::Local));
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        let session = Arc::new(
            StorySession::create(
                &sample_setup(3),
                None,
                GenerationClient::new(service.clone()),
                gateway,
                &clock,
                &SequentialIds::new(),
            )
            .unwrap(),
        );
        let running = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });
        service.wait_until_entered().await;

        // Act
        let save = session.save().await;
        let continued = session.continue_with("Leave a note").await;
        let deleted = session.delete(true).await;

        // Assert
        let id = session.id();
        assert_eq!(save.unwrap_err(), StoryError::Busy(id));
        assert_eq!(continued.unwrap_err(), StoryError::Busy(id));
        assert_eq!(deleted.unwrap_err(), StoryError::Busy(id));
        assert!(session.is_busy());
        assert_eq!(repository.upsert_count(), 0);

        service.release();
        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome.story.state(), StoryState::InProgress);
        assert!(!session.is_busy());
        assert_eq!(session.save().await.unwrap(), SaveOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_autosave_failure_keeps_completed_turn() {
        // Arrange
        let service = Arc::new(ScriptedTextService::new(full_run(1)));
        let gateway = Arc::new(PersistenceGateway::new(
            Arc::new(FailingStoryRepository::unavailable()),
            StorageScope::Local,
        ));
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        let session = StorySession::create(
            &sample_setup(1),
            None,
            GenerationClient::new(service),
            gateway,
            &clock,
            &SequentialIds::new(),
        )
        .unwrap();

        // Act
        let outcome = session.start().await.unwrap();

        // Assert
        assert!(outcome.story.is_completed());
        assert!(matches!(
            outcome.autosave,
            Some(Err(PersistenceError::Unavailable(_)))
        ));
        assert!(session.snapshot().await.is_completed());
    }

    #[tokio::test]
    async fn test_persisted_flag_tracks_unsaved_episodes() {
        // Arrange
        let h = harness(2, full_run(2), None);
        assert!(!h.session.is_persisted());

        // Act
        h.session.start().await.unwrap();
        let after_start = h.session.is_persisted();
        h.session.save().await.unwrap();
        let after_save = h.session.is_persisted();
        h.session.continue_with("Leave a note").await.unwrap();

        // Assert
        assert!(!after_start);
        assert!(after_save);
        assert!(h.session.is_persisted());
    }

    #[tokio::test]
    async fn test_unconfirmed_delete_keeps_record() {
        let h = harness(3, full_run(3), None);
        h.session.save().await.unwrap();

        let err = h.session.delete(false).await.unwrap_err();

        assert_eq!(
            err,
            StoryError::Validation(ValidationError::DeletionUnconfirmed(h.session.id()))
        );
        assert_eq!(h.repository.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_delete_removes_record() {
        let h = harness(3, full_run(3), None);
        h.session.save().await.unwrap();

        h.session.delete(true).await.unwrap();

        assert!(h.repository.stored().is_empty());
    }

    #[tokio::test]
    async fn test_share_requires_completion() {
        let h = harness(3, full_run(3), Some(sample_identity("reader")));
        h.session.start().await.unwrap();

        let err = h.session.share(AttributionChoice::DisplayName).await.unwrap_err();

        assert_eq!(
            err,
            StoryError::Share(ShareError::NotCompleted(h.session.id()))
        );
        assert!(!h.session.snapshot().await.sharing().shared);
    }

    #[tokio::test]
    async fn test_share_completed_story_updates_live_copy() {
        let h = harness(1, full_run(1), Some(sample_identity("reader")));
        h.session.start().await.unwrap();

        let shared = h.session.share(AttributionChoice::Anonymous).await.unwrap();

        assert!(shared.sharing().shared);
        assert!(h.session.snapshot().await.sharing().shared);
        assert_eq!(h.repository.upsert_count(), 1);
    }
}
