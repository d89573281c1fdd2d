//! Backend selection from the identity signal.

use std::sync::Arc;

use pikfic_core::error::PersistenceError;
use pikfic_core::identity::Identity;
use pikfic_story::domain::repository::{RemoteRepositories, StoryRepository};
use tracing::debug;

use crate::gateway::{PersistenceGateway, StorageScope};

/// Chooses the local or remote backend for a session.
#[derive(Clone)]
pub struct BackendSelector {
    local: Arc<dyn StoryRepository>,
    remote: Option<Arc<dyn RemoteRepositories>>,
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("remote_enabled", &self.remote.is_some())
            .finish_non_exhaustive()
    }
}

impl BackendSelector {
    /// Selector over a local library and an optional remote backend.
    #[must_use]
    pub fn new(
        local: Arc<dyn StoryRepository>,
        remote: Option<Arc<dyn RemoteRepositories>>,
    ) -> Self {
        Self { local, remote }
    }

    /// The device-local library.
    #[must_use]
    pub fn local(&self) -> &Arc<dyn StoryRepository> {
        &self.local
    }

    /// Whether a remote backend is configured.
    #[must_use]
    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Gateway for `identity`: local when absent, the owner's remote
    /// library when present.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Unavailable` for an identity when no remote
    /// backend is configured.
    pub fn select(&self, identity: Option<&Identity>) -> Result<PersistenceGateway, PersistenceError> {
        match (identity, &self.remote) {
            (None, _) => {
                debug!("using local library");
                Ok(PersistenceGateway::new(
                    Arc::clone(&self.local),
                    StorageScope::Local,
                ))
            }
            (Some(identity), Some(remote)) => {
                debug!(owner = %identity.owner_id, "using remote library");
                Ok(PersistenceGateway::new(
                    remote.for_owner(&identity.owner_id),
                    StorageScope::Remote {
                        owner: identity.owner_id.clone(),
                    },
                ))
            }
            (Some(_), None) => Err(PersistenceError::Unavailable(
                "remote library is not configured".to_owned(),
            )),
        }
    }
}
