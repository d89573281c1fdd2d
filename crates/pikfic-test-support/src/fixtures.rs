//! Canned inputs and model replies.

use pikfic_core::identity::{Identity, OwnerId};
use pikfic_core::language::Language;
use pikfic_story::domain::cast::{CharacterRef, Counterpart};
use pikfic_story::domain::setup::StorySetup;

/// A valid English campus setup with the given target length.
#[must_use]
pub fn sample_setup(total_episodes: u32) -> StorySetup {
    StorySetup {
        lead: CharacterRef::new("Aurora", "Min"),
        counterpart: Counterpart::Named(CharacterRef::new("Nova", "Jae")),
        supporting: Vec::new(),
        genre: "campus".to_owned(),
        premise: "They share a library carrel during finals week.".to_owned(),
        total_episodes,
        language: Language::English,
    }
}

/// A signed-in identity with a display name.
#[must_use]
pub fn sample_identity(owner: &str) -> Identity {
    Identity::new(OwnerId::new(owner), Some(format!("{owner}-name")))
}

/// A valid middle-episode reply.
#[must_use]
pub fn episode_json(content: &str) -> String {
    format!(
        r#"{{"content":"{content}","suggestions":["Stay quiet","Leave a note","Ask directly"]}}"#
    )
}

/// A valid first-episode reply carrying a title.
#[must_use]
pub fn opening_episode_json(content: &str, title: &str) -> String {
    format!(
        r#"{{"content":"{content}","suggestions":["Stay quiet","Leave a note","Ask directly"],"storyTitle":"{title}"}}"#
    )
}

/// A valid final-episode reply carrying hashtags.
#[must_use]
pub fn closing_episode_json(content: &str) -> String {
    format!(r##"{{"content":"{content}","hashtags":["#finals","#rain","#carrel"]}}"##)
}
