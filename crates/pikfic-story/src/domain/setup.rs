//! Compose-screen input and its validation.

use pikfic_core::error::ValidationError;
use pikfic_core::language::Language;
use serde::{Deserialize, Serialize};

use super::cast::{Cast, CharacterRef, Counterpart};

/// Largest target episode count a story may be created with.
pub const MAX_TOTAL_EPISODES: u32 = 20;

/// Everything the user fills in before the first episode is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySetup {
    /// Primary character.
    pub lead: CharacterRef,
    /// Secondary character.
    pub counterpart: Counterpart,
    /// Supporting characters.
    #[serde(default)]
    pub supporting: Vec<CharacterRef>,
    /// Genre key, looked up by the prompt builder.
    pub genre: String,
    /// Free-text premise that seeds episode 1.
    pub premise: String,
    /// Target episode count.
    pub total_episodes: u32,
    /// Narrative language.
    #[serde(default)]
    pub language: Language,
}

/// Setup that passed validation, with text fields trimmed.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedSetup {
    pub(crate) cast: Cast,
    pub(crate) genre: String,
    pub(crate) premise: String,
    pub(crate) total_episodes: u32,
    pub(crate) language: Language,
}

/// Name given to a self-insert slot left blank.
#[must_use]
pub fn default_self_insert_name(language: Language) -> &'static str {
    match language {
        Language::Korean => "여주",
        Language::English | Language::Japanese | Language::Chinese => "Y/N",
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_owned())
}

fn character(
    value: &CharacterRef,
    group_field: &'static str,
    name_field: &'static str,
) -> Result<CharacterRef, ValidationError> {
    Ok(CharacterRef {
        group: required(&value.group, group_field)?,
        name: required(&value.name, name_field)?,
    })
}

impl StorySetup {
    /// Checks required fields and the episode range.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` for a blank lead, named
    /// counterpart, supporting character, genre or premise, and
    /// `ValidationError::EpisodeCountOutOfRange` when `total_episodes` is 0
    /// or above [`MAX_TOTAL_EPISODES`].
    pub(crate) fn validate(&self) -> Result<ValidatedSetup, ValidationError> {
        let lead = character(&self.lead, "lead.group", "lead.name")?;
        let counterpart = match &self.counterpart {
            Counterpart::Named(named) => {
                Counterpart::Named(character(named, "counterpart.group", "counterpart.name")?)
            }
            Counterpart::SelfInsert { display_name } => {
                let trimmed = display_name.trim();
                let display_name = if trimmed.is_empty() {
                    default_self_insert_name(self.language).to_owned()
                } else {
                    trimmed.to_owned()
                };
                Counterpart::SelfInsert { display_name }
            }
        };
        let supporting = self
            .supporting
            .iter()
            .map(|extra| character(extra, "supporting.group", "supporting.name"))
            .collect::<Result<Vec<_>, _>>()?;

        if self.total_episodes == 0 || self.total_episodes > MAX_TOTAL_EPISODES {
            return Err(ValidationError::EpisodeCountOutOfRange {
                max: MAX_TOTAL_EPISODES,
                actual: self.total_episodes,
            });
        }

        Ok(ValidatedSetup {
            cast: Cast {
                lead,
                counterpart,
                supporting,
            },
            genre: required(&self.genre, "genre")?,
            premise: required(&self.premise, "premise")?,
            total_episodes: self.total_episodes,
            language: self.language,
        })
    }
}
