//! Prompt construction.
//!
//! `build_request` is a pure function of the story, the text that drives the
//! next episode (the premise for episode 1, the chosen continuation after
//! that), and the episode number being requested.

use std::fmt::Write as _;

use pikfic_core::error::ValidationError;
use pikfic_core::language::Language;
use pikfic_story::domain::aggregates::{Story, StoryState};
use pikfic_story::domain::cast::{CharacterRef, Counterpart};
use pikfic_story::domain::setup::MAX_TOTAL_EPISODES;

use crate::genre;

/// Characters of each prior episode carried into the context window.
pub const CONTEXT_TAIL_CHARS: usize = 1000;

/// Where a turn sits within the story arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeStage {
    /// Episode 1.
    Introduction,
    /// Under 40% of the way through.
    RisingAction,
    /// Under 80% of the way through.
    Crisis,
    /// The run-up to the final episode.
    Climax,
    /// The final episode.
    Conclusion,
}

impl NarrativeStage {
    /// Stage for episode `n` of `total`. Callers guarantee `1 <= n <= total`.
    #[must_use]
    pub fn for_episode(n: u32, total: u32) -> Self {
        if n == 1 {
            return Self::Introduction;
        }
        if n == total {
            return Self::Conclusion;
        }
        let progress = f64::from(n) / f64::from(total);
        if progress < 0.4 {
            Self::RisingAction
        } else if progress < 0.8 {
            Self::Crisis
        } else {
            Self::Climax
        }
    }

    /// Label written into the prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Introduction => "Introduction",
            Self::RisingAction => "Rising Action",
            Self::Crisis => "Crisis",
            Self::Climax => "Climax",
            Self::Conclusion => "Conclusion",
        }
    }

    fn guidance(self) -> &'static str {
        match self {
            Self::Introduction => {
                "Establish the setting, the characters, and the initial incident. Hook the reader immediately."
            }
            Self::RisingAction => {
                "Develop the relationships and introduce minor conflicts or events that build tension."
            }
            Self::Crisis => {
                "Deepen the conflict. The characters face emotional or external hurdles."
            }
            Self::Climax => {
                "Tension peaks. Prepare for the final resolution and end on a strong emotional beat or cliffhanger."
            }
            Self::Conclusion => {
                "Bring every conflict to a close with a satisfying emotional payoff or a lingering ending."
            }
        }
    }
}

/// Which model class should serve a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Higher-capability model for first, last, and every fifth episode.
    Major,
    /// Lighter model for everything else.
    Light,
}

impl ModelTier {
    /// Tier for episode `n` of `total`.
    #[must_use]
    pub fn for_episode(n: u32, total: u32) -> Self {
        if n == 1 || n == total || n % 5 == 0 {
            Self::Major
        } else {
            Self::Light
        }
    }
}

/// Optional fields a response is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseExpectations {
    /// A `storyTitle` was requested.
    pub title: bool,
    /// Three `hashtags` were requested.
    pub hashtags: bool,
    /// This is the final episode, so `suggestions` may be absent.
    pub closing: bool,
}

/// A fully assembled generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Episode being generated.
    pub episode_number: u32,
    /// Arc position of that episode.
    pub stage: NarrativeStage,
    /// Model-tier hint.
    pub model_tier: ModelTier,
    /// System instruction.
    pub system_instruction: String,
    /// User prompt.
    pub user_prompt: String,
    /// Optional fields to request and validate.
    pub expects: ResponseExpectations,
}

const WRITING_RULES: &str = "\
You are a celebrated fiction writer known for deep emotional insight and vivid sensory description.

[WRITING RULES]
1. LENGTH: Write an immersive, detailed episode of roughly 500-1000 characters of prose.
2. SHOW, DON'T TELL: Reveal personality through action, hesitation, and small habits, never by describing it outright.
3. PERSONAS: Rely only on the provided names and affiliations to infer each persona. If a person is unknown, infer a persona from the genre.
4. GENRE FAITHFULNESS: Follow the conventions of the selected genre strictly.
5. NEXT STEPS: Provide exactly 3 distinct plot suggestions for the next episode.
6. FORMATTING: Separate paragraphs with a blank line (\\n\\n). No HTML.
7. STRUCTURE: Follow the narrative stage given in the story settings strictly.
8. NO REPETITION: Do not summarise or restate the previous context. Continue directly after its last sentence.";

const KOREAN_TONE: &str = "\
[TONE]
- NARRATION: Use the Korean plain form (해라체, ~ㄴ다/~다) for all narration. Never use polite endings (~니다, ~요) in narration.
- DIALOGUE: Characters speak naturally for their relationship, with honorifics or casual speech as fits.";

fn named_descriptor(character: &CharacterRef) -> String {
    format!(
        "'{}' (persona associated with {})",
        character.name, character.group
    )
}

fn counterpart_descriptor(counterpart: &Counterpart) -> String {
    match counterpart {
        Counterpart::Named(character) => named_descriptor(character),
        Counterpart::SelfInsert { display_name } => format!(
            "'{display_name}' (the reader's stand-in protagonist, addressed as 'you' or by this name)"
        ),
    }
}

fn supporting_line(supporting: &[CharacterRef]) -> String {
    if supporting.is_empty() {
        return "No major supporting characters yet.".to_owned();
    }
    let names: Vec<String> = supporting
        .iter()
        .map(|extra| format!("{} ({})", extra.name, extra.group))
        .collect();
    format!("Supporting characters: {}", names.join(", "))
}

/// Last `budget` characters of `text`, on a char boundary.
fn tail(text: &str, budget: usize) -> &str {
    let count = text.chars().count();
    if count <= budget {
        return text;
    }
    text.char_indices()
        .nth(count - budget)
        .map_or(text, |(offset, _)| &text[offset..])
}

/// Chapter-labelled tails of every prior episode, oldest first.
#[must_use]
pub fn context_window(story: &Story) -> String {
    story
        .episodes()
        .iter()
        .map(|episode| {
            format!(
                "[Chapter {}]\n{}",
                episode.number,
                tail(&episode.content, CONTEXT_TAIL_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn system_instruction(story: &Story, n: u32, stage: NarrativeStage, expects: ResponseExpectations) -> String {
    let cast = story.cast();
    let mut out = String::from(WRITING_RULES);
    if story.language() == Language::Korean {
        out.push_str("\n\n");
        out.push_str(KOREAN_TONE);
    }

    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "\n\n[STORY SETTINGS]\n\
         - Genre: {genre} ({augmentation})\n\
         - Main characters:\n  1. {lead}\n  2. {counterpart}\n\
         - {supporting}\n\
         - Character notes: personas and group affiliations are implicit reference for voice, tone, and style only. Never state them verbatim in the narrative.\n\
         - Premise: \"{premise}\"\n\
         - Current episode: {n} / {total}\n\
         - Language: {language}\n\
         - Stage: [{stage}]. {guidance}",
        genre = story.genre(),
        augmentation = genre::augmentation(story.genre()),
        lead = named_descriptor(&cast.lead),
        counterpart = counterpart_descriptor(&cast.counterpart),
        supporting = supporting_line(&cast.supporting),
        premise = story.premise(),
        total = story.total_episodes(),
        language = story.language().display_name(),
        stage = stage.label(),
        guidance = stage.guidance(),
    );

    if expects.title {
        out.push_str(
            "\n\n[SPECIAL TASK] Also produce a poetic, captivating title for this story in `storyTitle`.",
        );
    }
    if expects.hashtags {
        out.push_str(
            "\n\n[SPECIAL TASK] Also produce exactly 3 hashtags in `hashtags` that capture the mood and theme of the whole story.",
        );
    }
    out
}

fn continuation_prompt(story: &Story, choice: &str, n: u32) -> String {
    format!(
        "Previous story context:\n{context}\n\n\
         <user_action>{choice}</user_action>\n\
         The reader chose the action above for this turn. Write episode {n} of {total}, following the '{genre}' genre.",
        context = context_window(story),
        total = story.total_episodes(),
        genre = story.genre(),
    )
}

/// Builds the request for episode `n`.
///
/// `input` is the premise when `n == 1` and the chosen continuation otherwise.
///
/// # Errors
///
/// Returns `ValidationError::EpisodeCountOutOfRange` if the story has no
/// positive target, `ValidationError::EpisodeOutOfSequence` if `n` is not
/// `episodes.len() + 1`, and `ValidationError::InvalidTransition` if the
/// story is already completed.
pub fn build_request(story: &Story, input: &str, n: u32) -> Result<GenerationRequest, ValidationError> {
    let total = story.total_episodes();
    if total == 0 {
        return Err(ValidationError::EpisodeCountOutOfRange {
            max: MAX_TOTAL_EPISODES,
            actual: total,
        });
    }
    let expected = story.next_episode_number();
    if n != expected {
        return Err(ValidationError::EpisodeOutOfSequence {
            story_id: story.id(),
            requested: n,
            expected,
        });
    }
    if n > total {
        return Err(ValidationError::InvalidTransition {
            story_id: story.id(),
            state: StoryState::Completed.as_str(),
            operation: "generate",
        });
    }

    let stage = NarrativeStage::for_episode(n, total);
    let expects = ResponseExpectations {
        title: n == 1,
        hashtags: n == total,
        closing: n == total,
    };
    let user_prompt = if n == 1 {
        input.to_owned()
    } else {
        continuation_prompt(story, input, n)
    };

    Ok(GenerationRequest {
        episode_number: n,
        stage,
        model_tier: ModelTier::for_episode(n, total),
        system_instruction: system_instruction(story, n, stage, expects),
        user_prompt,
        expects,
    })
}
