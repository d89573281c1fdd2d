//! Shared test doubles and fixtures for Pikfic.

mod clock;
mod fixtures;
mod ids;
mod repository;
mod text_service;

pub use clock::FixedClock;
pub use fixtures::{
    closing_episode_json, episode_json, opening_episode_json, sample_identity, sample_setup,
};
pub use ids::SequentialIds;
pub use repository::{FailingStoryRepository, InMemoryRemoteRepositories, InMemoryStoryRepository};
pub use text_service::{GatedTextService, ScriptedTextService};
