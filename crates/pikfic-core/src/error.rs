//! Error taxonomy.
//!
//! Four families mirror the four ways a story operation can fail: the caller
//! asked for something inconsistent, the generative service misbehaved, the
//! storage backend refused or failed, or a share precondition was not met.
//! `StoryError` is what the orchestration boundary hands to its caller.

use thiserror::Error;
use uuid::Uuid;

use crate::language::Language;

/// Number of stories a single identity may keep in the remote library.
pub const REMOTE_STORY_QUOTA: usize = 10;

/// The caller supplied inconsistent or missing input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required setup field was blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The target episode count is outside the supported range.
    #[error("total episodes must be between 1 and {max}, got {actual}")]
    EpisodeCountOutOfRange {
        /// Largest accepted value.
        max: u32,
        /// The rejected value.
        actual: u32,
    },

    /// A generation was requested for an episode that is not next in line.
    #[error("story {story_id} expects episode {expected}, but episode {requested} was requested")]
    EpisodeOutOfSequence {
        /// The story being advanced.
        story_id: Uuid,
        /// Number the caller asked for.
        requested: u32,
        /// Number that would keep the sequence contiguous.
        expected: u32,
    },

    /// The lifecycle does not allow the operation in the current state.
    #[error("story {story_id} is {state}; {operation} is not allowed")]
    InvalidTransition {
        /// The story in question.
        story_id: Uuid,
        /// Current lifecycle state.
        state: &'static str,
        /// Operation that was refused.
        operation: &'static str,
    },

    /// A delete was attempted without explicit confirmation.
    #[error("deletion of story {0} was not confirmed")]
    DeletionUnconfirmed(Uuid),

    /// A persisted record breaks a story invariant.
    #[error("invalid story record: {0}")]
    InvalidRecord(String),
}

/// The generative-text service call failed or returned an unusable body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The service returned no text at all.
    #[error("generation service returned an empty response")]
    EmptyResponse,

    /// The body could not be parsed as JSON.
    #[error("generation response is not valid JSON: {0}")]
    MalformedJson(String),

    /// A required schema field is absent.
    #[error("generation response is missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but does not satisfy the schema.
    #[error("generation response field `{field}` is invalid: {reason}")]
    InvalidField {
        /// Offending field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The request never reached the service or the connection dropped.
    #[error("generation service unreachable: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("generation service error (status {status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        message: String,
    },

    /// The client was built with unusable settings.
    #[error("generation client misconfigured: {0}")]
    Config(String),
}

/// A storage backend failed or rejected a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// The identity already owns the maximum number of stories.
    #[error("story quota exceeded: an identity may keep at most {limit} stories")]
    QuotaExceeded {
        /// The cap that was hit.
        limit: usize,
    },

    /// No stored story has this identifier.
    #[error("story {0} not found")]
    NotFound(Uuid),

    /// The backend could not be reached or is not configured.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the write.
    #[error("storage write rejected: {0}")]
    Rejected(String),

    /// A stored record could not be decoded into a valid story.
    #[error("stored story is corrupt: {0}")]
    Corrupt(String),
}

impl PersistenceError {
    /// Whether this is the expected, recoverable quota condition.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Promotion of a story to the shared pool failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    /// Only completed stories can be shared.
    #[error("story {0} is not completed")]
    NotCompleted(Uuid),

    /// Sharing needs an owner.
    #[error("sharing requires a signed-in identity")]
    NoIdentity,

    /// The pre-share save failed.
    #[error("could not save story before sharing: {0}")]
    Save(#[source] PersistenceError),

    /// The shared flag could not be written.
    #[error("could not mark story as shared: {0}")]
    Flag(#[source] PersistenceError),
}

/// Everything a story operation can surface to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryError {
    /// Inconsistent or missing input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Generative service failure.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Storage failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Share precondition or update failure.
    #[error(transparent)]
    Share(#[from] ShareError),

    /// Another mutating operation on this story is still in flight.
    #[error("story {0} already has an operation in flight")]
    Busy(Uuid),

    /// The operation only exists for a signed-in identity.
    #[error("this operation requires a signed-in identity")]
    IdentityRequired,
}

impl StoryError {
    /// Single user-visible notification for this error.
    ///
    /// Korean stories get Korean copy; every other language falls back to
    /// English.
    #[must_use]
    pub fn user_message(&self, language: Language) -> String {
        let korean = language == Language::Korean;
        let text = match self {
            Self::Validation(_) => {
                if korean {
                    "입력값을 다시 확인해주세요."
                } else {
                    "Please check the story settings and try again."
                }
            }
            Self::Generation(_) => {
                if korean {
                    "다음 회차 생성에 실패했습니다. 잠시 후 다시 시도해주세요."
                } else {
                    "Failed to generate the next episode. Please try again."
                }
            }
            Self::Persistence(PersistenceError::QuotaExceeded { limit })
            | Self::Share(ShareError::Save(PersistenceError::QuotaExceeded { limit })) => {
                return if korean {
                    format!("서재에는 최대 {limit}개의 이야기만 저장할 수 있습니다. 기존 이야기를 삭제한 뒤 다시 시도해주세요.")
                } else {
                    format!("Your library is full ({limit} stories). Delete a story and try again.")
                };
            }
            Self::Persistence(_) => {
                if korean {
                    "서재 저장에 실패했습니다. 잠시 후 다시 시도해주세요."
                } else {
                    "Could not save to your library. Please try again."
                }
            }
            Self::Share(ShareError::NotCompleted(_)) => {
                if korean {
                    "완결된 이야기만 공유할 수 있습니다."
                } else {
                    "Only completed stories can be shared."
                }
            }
            Self::Share(ShareError::NoIdentity) => {
                if korean {
                    "공유하려면 로그인이 필요합니다."
                } else {
                    "Sign in to share your story."
                }
            }
            Self::Share(_) => {
                if korean {
                    "공유에 실패했습니다. 잠시 후 다시 시도해주세요."
                } else {
                    "Sharing failed. Please try again."
                }
            }
            Self::IdentityRequired => {
                if korean {
                    "로그인이 필요합니다."
                } else {
                    "Please sign in first."
                }
            }
            Self::Busy(_) => {
                if korean {
                    "이전 요청을 처리하고 있습니다. 잠시만 기다려주세요."
                } else {
                    "Still working on your previous request."
                }
            }
        };
        text.to_owned()
    }
}
