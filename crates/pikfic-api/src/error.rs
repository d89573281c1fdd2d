//! Pikfic — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pikfic_core::error::{PersistenceError, ShareError, StoryError, ValidationError};
use pikfic_core::language::Language;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Localized, user-facing message.
    pub message: String,
}

/// HTTP-layer wrapper around `StoryError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError {
    /// The domain error being reported.
    pub error: StoryError,
    /// Language of the user-facing message.
    pub language: Language,
}

impl ApiError {
    /// Wraps `error`, localizing its message for `language`.
    #[must_use]
    pub fn new(error: impl Into<StoryError>, language: Language) -> Self {
        Self {
            error: error.into(),
            language,
        }
    }

    /// Status code and machine code for the wrapped error.
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.error {
            StoryError::Validation(ValidationError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            StoryError::Validation(ValidationError::DeletionUnconfirmed(_)) => {
                (StatusCode::BAD_REQUEST, "deletion_unconfirmed")
            }
            StoryError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            StoryError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            StoryError::Persistence(PersistenceError::QuotaExceeded { .. })
            | StoryError::Share(ShareError::Save(PersistenceError::QuotaExceeded { .. })) => {
                (StatusCode::CONFLICT, "quota_exceeded")
            }
            StoryError::Persistence(PersistenceError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "story_not_found")
            }
            StoryError::Persistence(PersistenceError::Unavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            StoryError::Persistence(PersistenceError::Rejected(_)) => {
                (StatusCode::FORBIDDEN, "storage_rejected")
            }
            StoryError::Persistence(PersistenceError::Corrupt(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_corrupt")
            }
            StoryError::Share(ShareError::NotCompleted(_)) => {
                (StatusCode::PRECONDITION_FAILED, "story_not_completed")
            }
            StoryError::Share(ShareError::NoIdentity) => {
                (StatusCode::UNAUTHORIZED, "identity_required")
            }
            StoryError::Share(ShareError::Save(_) | ShareError::Flag(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "share_failed")
            }
            StoryError::IdentityRequired => (StatusCode::UNAUTHORIZED, "identity_required"),
            StoryError::Busy(_) => (StatusCode::CONFLICT, "busy"),
        }
    }

    /// The response body for the wrapped error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.status_and_code().1,
            message: self.error.user_message(self.language),
        }
    }
}

impl From<StoryError> for ApiError {
    fn from(error: StoryError) -> Self {
        Self::new(error, Language::default())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(error: PersistenceError) -> Self {
        Self::new(error, Language::default())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();
        if status.is_server_error() {
            tracing::warn!(error = %self.error, %status, "request failed");
        } else {
            tracing::debug!(error = %self.error, %status, "request refused");
        }
        (status, Json(self.body())).into_response()
    }
}
