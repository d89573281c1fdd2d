//! Promotion of completed stories to the shared pool.

use std::sync::Arc;

use pikfic_core::error::ShareError;
use pikfic_core::identity::Identity;
use pikfic_story::domain::aggregates::Story;
use tracing::info;

use crate::gateway::PersistenceGateway;

/// Credit line used when the owner opts out of being named.
pub const ANONYMOUS_ATTRIBUTION: &str = "Anonymous";

/// How the owner wants to be credited on a shared story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributionChoice {
    /// Use the identity's display name.
    #[default]
    DisplayName,
    /// Use [`ANONYMOUS_ATTRIBUTION`].
    Anonymous,
}

fn attribution_label(identity: &Identity, choice: AttributionChoice) -> String {
    match (choice, identity.display_name.as_deref().map(str::trim)) {
        (AttributionChoice::DisplayName, Some(name)) if !name.is_empty() => name.to_owned(),
        _ => ANONYMOUS_ATTRIBUTION.to_owned(),
    }
}

/// Persists a completed story and flags it as shared.
#[derive(Debug, Clone)]
pub struct SharingGate {
    gateway: Arc<PersistenceGateway>,
}

impl SharingGate {
    /// Gate writing through `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Shares `story` under the chosen attribution and returns the flagged
    /// story.
    ///
    /// # Errors
    ///
    /// Returns `ShareError::NotCompleted` or `ShareError::NoIdentity` when a
    /// precondition fails, `ShareError::Save` if the pre-share save fails,
    /// and `ShareError::Flag` if the shared flag cannot be written.
    pub async fn share(
        &self,
        story: &Story,
        identity: Option<&Identity>,
        choice: AttributionChoice,
    ) -> Result<Story, ShareError> {
        if !story.is_completed() {
            return Err(ShareError::NotCompleted(story.id()));
        }
        let identity = identity.ok_or(ShareError::NoIdentity)?;

        self.gateway.save(story).await.map_err(ShareError::Save)?;
        let label = attribution_label(identity, choice);
        self.gateway
            .mark_shared(story.id(), &label)
            .await
            .map_err(ShareError::Flag)?;

        info!(story_id = %story.id(), anonymous = label == ANONYMOUS_ATTRIBUTION, "story shared");
        let mut shared = story.clone();
        shared.mark_shared(label);
        Ok(shared)
    }
}
