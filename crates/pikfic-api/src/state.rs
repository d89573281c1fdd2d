//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use pikfic_core::clock::Clock;
use pikfic_core::error::StoryError;
use pikfic_core::id::IdGenerator;
use pikfic_core::identity::{Identity, OwnerId};
use pikfic_generation::client::GenerationClient;
use pikfic_persistence::gateway::PersistenceGateway;
use pikfic_persistence::selector::BackendSelector;
use pikfic_session::application::story_session::StorySession;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

type SessionKey = (Option<OwnerId>, Uuid);

/// Live sessions, keyed by owner and story id so identities never see each
/// other's sessions.
///
/// Only sessions holding unsaved episodes, or in use by a request, stay
/// registered. Everything else is resumed from storage on demand.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, Arc<StorySession>>>,
}

fn key(identity: Option<&Identity>, story_id: Uuid) -> SessionKey {
    (identity.map(|identity| identity.owner_id.clone()), story_id)
}

impl SessionRegistry {
    async fn get(&self, identity: Option<&Identity>, story_id: Uuid) -> Option<Arc<StorySession>> {
        self.sessions
            .lock()
            .await
            .get(&key(identity, story_id))
            .cloned()
    }

    /// Registers `session`, keeping an already registered one for the same key.
    async fn insert(
        &self,
        identity: Option<&Identity>,
        session: StorySession,
    ) -> Arc<StorySession> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(
            sessions
                .entry(key(identity, session.id()))
                .or_insert_with(|| Arc::new(session)),
        )
    }

    async fn remove(&self, identity: Option<&Identity>, story_id: Uuid) {
        self.sessions.lock().await.remove(&key(identity, story_id));
    }

    /// Evicts `session` if it is idle, saved, and held by no other request.
    async fn release(&self, identity: Option<&Identity>, session: &Arc<StorySession>) {
        let mut sessions = self.sessions.lock().await;
        let key = key(identity, session.id());
        // One reference in the map, one held by the caller.
        let idle = sessions.get(&key).is_some_and(|live| {
            Arc::ptr_eq(live, session)
                && Arc::strong_count(session) == 2
                && !session.is_busy()
                && session.is_persisted()
        });
        if idle {
            sessions.remove(&key);
            debug!(story_id = %session.id(), live = sessions.len(), "session released");
        }
    }

    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for creation timestamps.
    pub clock: Arc<dyn Clock>,
    /// Story identifier source.
    pub ids: Arc<dyn IdGenerator>,
    /// Generation client handed to every session.
    pub generator: GenerationClient,
    /// Local/remote backend selection.
    pub selector: BackendSelector,
    sessions: Arc<SessionRegistry>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        generator: GenerationClient,
        selector: BackendSelector,
    ) -> Self {
        Self {
            clock,
            ids,
            generator,
            selector,
            sessions: Arc::new(SessionRegistry::default()),
        }
    }

    /// Gateway for the request's identity.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Persistence` when the identity needs a remote
    /// backend that is not configured.
    pub fn gateway(&self, identity: Option<&Identity>) -> Result<Arc<PersistenceGateway>, StoryError> {
        Ok(Arc::new(self.selector.select(identity)?))
    }

    /// Registers a freshly created session.
    pub async fn register(
        &self,
        identity: Option<&Identity>,
        session: StorySession,
    ) -> Arc<StorySession> {
        self.sessions.insert(identity, session).await
    }

    /// Live session for `story_id`, resuming it from storage when it is not
    /// already registered.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NotFound` if the story is neither live nor
    /// stored in the identity's backend.
    pub async fn session(
        &self,
        identity: Option<&Identity>,
        story_id: Uuid,
    ) -> Result<Arc<StorySession>, StoryError> {
        if let Some(session) = self.sessions.get(identity, story_id).await {
            return Ok(session);
        }
        let gateway = self.gateway(identity)?;
        let story =
            pikfic_session::application::query_handlers::get_story(&gateway, story_id).await?;
        let session = StorySession::resume(
            story,
            identity.cloned(),
            self.generator.clone(),
            gateway,
        );
        Ok(self.sessions.insert(identity, session).await)
    }

    /// Live session for `story_id`, if one is registered.
    pub async fn live_session(
        &self,
        identity: Option<&Identity>,
        story_id: Uuid,
    ) -> Option<Arc<StorySession>> {
        self.sessions.get(identity, story_id).await
    }

    /// Drops `session` from the registry when it has nothing left to save.
    pub async fn release(&self, identity: Option<&Identity>, session: &Arc<StorySession>) {
        self.sessions.release(identity, session).await;
    }

    /// Number of registered sessions.
    pub async fn live_session_count(&self) -> usize {
        self.sessions.len().await
    }

    /// Drops the live session for `story_id`.
    pub async fn forget(&self, identity: Option<&Identity>, story_id: Uuid) {
        self.sessions.remove(identity, story_id).await;
    }
}
