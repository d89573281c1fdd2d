//! Routes for composing, continuing and managing stories.

use std::convert::Infallible;
use std::pin::Pin;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use pikfic_core::error::StoryError;
use pikfic_core::identity::Identity;
use pikfic_core::language::Language;
use pikfic_persistence::sharing::AttributionChoice;
use pikfic_session::application::query_handlers::{self, StorySummary};
use pikfic_session::application::story_session::{StorySession, TurnOutcome};
use pikfic_story::domain::aggregates::Story;
use pikfic_story::domain::setup::StorySetup;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::CurrentIdentity;
use crate::state::AppState;

/// Request body for POST /{id}/continue.
#[derive(Debug, Deserialize)]
pub struct ContinueRequest {
    /// One of the suggested continuations, or the reader's own text.
    pub choice: String,
}

/// Request body for POST /{id}/share.
#[derive(Debug, Default, Deserialize)]
pub struct ShareRequest {
    /// Credit the story to the anonymous placeholder instead of the display name.
    #[serde(default)]
    pub anonymous: bool,
}

/// Query string for DELETE /{id}.
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    /// Must be `true` for the delete to happen.
    #[serde(default)]
    pub confirm: bool,
}

/// Automatic save result attached to the turn that completed a story.
#[derive(Debug, Serialize)]
pub struct AutosaveStatus {
    /// `inserted`, `updated`, `unchanged` or `failed`.
    pub status: &'static str,
    /// Localized notification when the save failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response body for a start or continue turn.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// The story after the new episode.
    pub story: Story,
    /// Present on the turn that completed the story.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autosave: Option<AutosaveStatus>,
}

impl TurnResponse {
    fn new(outcome: TurnOutcome, language: Language) -> Self {
        let autosave = outcome.autosave.map(|result| match result {
            Ok(saved) => AutosaveStatus {
                status: saved.as_str(),
                message: None,
            },
            Err(e) => AutosaveStatus {
                status: "failed",
                message: Some(StoryError::from(e).user_message(language)),
            },
        });
        Self {
            story: outcome.story,
            autosave,
        }
    }
}

/// Response body for POST /{id}/save.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// `inserted`, `updated` or `unchanged`.
    pub outcome: &'static str,
}

#[derive(Serialize)]
struct Delta<'a> {
    text: &'a str,
}

fn json_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

fn final_event(result: Result<TurnOutcome, StoryError>, language: Language) -> Event {
    match result {
        Ok(outcome) => json_event("episode", &TurnResponse::new(outcome, language)),
        Err(e) => json_event("error", &ApiError::new(e, language).body()),
    }
}

type EventBody = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

type EventStream = Sse<KeepAliveStream<EventBody>>;

fn event_stream(rx: mpsc::UnboundedReceiver<Event>) -> EventStream {
    let body: EventBody = Box::pin(UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>));
    Sse::new(body).keep_alive(KeepAlive::default())
}

/// Sends advisory prose as `delta` events.
fn delta_observer(tx: mpsc::UnboundedSender<Event>) -> impl FnMut(&str) + Send {
    move |text: &str| {
        // A closed channel means the client went away; the turn still finishes.
        let _ = tx.send(json_event("delta", &Delta { text }));
    }
}

fn create_session(
    state: &AppState,
    identity: Option<&Identity>,
    setup: &StorySetup,
) -> Result<StorySession, ApiError> {
    let language = setup.language;
    let gateway = state
        .gateway(identity)
        .map_err(|e| ApiError::new(e, language))?;
    StorySession::create(
        setup,
        identity.cloned(),
        state.generator.clone(),
        gateway,
        state.clock.as_ref(),
        state.ids.as_ref(),
    )
    .map_err(|e| ApiError::new(e, language))
}

/// POST /
///
/// Drafts the story and generates episode 1. A failed first episode discards
/// the draft.
#[instrument(skip_all, fields(genre = %setup.genre))]
async fn create_story(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(setup): Json<StorySetup>,
) -> Result<(StatusCode, Json<TurnResponse>), ApiError> {
    let correlation_id = Uuid::new_v4();
    let session = create_session(&state, identity.as_ref(), &setup)?;
    info!(%correlation_id, story_id = %session.id(), "handling create_story");

    let outcome = session
        .start()
        .await
        .map_err(|e| ApiError::new(e, setup.language))?;
    let session = state.register(identity.as_ref(), session).await;
    state.release(identity.as_ref(), &session).await;

    Ok((
        StatusCode::CREATED,
        Json(TurnResponse::new(outcome, setup.language)),
    ))
}

/// POST /stream
#[instrument(skip_all, fields(genre = %setup.genre))]
async fn create_story_stream(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(setup): Json<StorySetup>,
) -> Result<EventStream, ApiError> {
    let correlation_id = Uuid::new_v4();
    let session = create_session(&state, identity.as_ref(), &setup)?;
    info!(%correlation_id, story_id = %session.id(), "handling create_story_stream");

    let language = setup.language;
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut observer = delta_observer(tx.clone());
        let result = session.start_streaming(&mut observer).await;
        if result.is_ok() {
            let session = state.register(identity.as_ref(), session).await;
            state.release(identity.as_ref(), &session).await;
        }
        let _ = tx.send(final_event(result, language));
    });
    Ok(event_stream(rx))
}

/// POST /{id}/continue
#[instrument(skip(state, identity, request), fields(story_id = %story_id))]
async fn continue_story(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(story_id): Path<Uuid>,
    Json(request): Json<ContinueRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let correlation_id = Uuid::new_v4();
    info!(%correlation_id, "handling continue_story");

    let session = state.session(identity.as_ref(), story_id).await?;
    let language = session.language();
    let result = session.continue_with(&request.choice).await;
    state.release(identity.as_ref(), &session).await;
    let outcome = result.map_err(|e| ApiError::new(e, language))?;

    Ok(Json(TurnResponse::new(outcome, language)))
}

/// POST /{id}/continue/stream
#[instrument(skip(state, identity, request), fields(story_id = %story_id))]
async fn continue_story_stream(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(story_id): Path<Uuid>,
    Json(request): Json<ContinueRequest>,
) -> Result<EventStream, ApiError> {
    let correlation_id = Uuid::new_v4();
    info!(%correlation_id, "handling continue_story_stream");

    let session = state.session(identity.as_ref(), story_id).await?;
    let language = session.language();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut observer = delta_observer(tx.clone());
        let result = session
            .continue_streaming(&request.choice, &mut observer)
            .await;
        state.release(identity.as_ref(), &session).await;
        let _ = tx.send(final_event(result, language));
    });
    Ok(event_stream(rx))
}

/// POST /{id}/save
#[instrument(skip(state, identity), fields(story_id = %story_id))]
async fn save_story(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(story_id): Path<Uuid>,
) -> Result<Json<SaveResponse>, ApiError> {
    let correlation_id = Uuid::new_v4();
    info!(%correlation_id, "handling save_story");

    let session = state.session(identity.as_ref(), story_id).await?;
    let result = session.save().await;
    state.release(identity.as_ref(), &session).await;
    let outcome = result.map_err(|e| ApiError::new(e, session.language()))?;

    Ok(Json(SaveResponse {
        outcome: outcome.as_str(),
    }))
}

/// DELETE /{id}?confirm=true
#[instrument(skip(state, identity, params), fields(story_id = %story_id))]
async fn delete_story(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(story_id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = Uuid::new_v4();
    info!(%correlation_id, confirm = params.confirm, "handling delete_story");

    let session = state.session(identity.as_ref(), story_id).await?;
    if let Err(e) = session.delete(params.confirm).await {
        state.release(identity.as_ref(), &session).await;
        return Err(ApiError::new(e, session.language()));
    }
    state.forget(identity.as_ref(), story_id).await;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /{id}/share
#[instrument(skip(state, identity, request), fields(story_id = %story_id))]
async fn share_story(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(story_id): Path<Uuid>,
    request: Option<Json<ShareRequest>>,
) -> Result<Json<Story>, ApiError> {
    let correlation_id = Uuid::new_v4();
    let request = request.map(|Json(request)| request).unwrap_or_default();
    info!(%correlation_id, anonymous = request.anonymous, "handling share_story");

    let session = state.session(identity.as_ref(), story_id).await?;
    let choice = if request.anonymous {
        AttributionChoice::Anonymous
    } else {
        AttributionChoice::DisplayName
    };
    let result = session.share(choice).await;
    state.release(identity.as_ref(), &session).await;
    let shared = result.map_err(|e| ApiError::new(e, session.language()))?;

    Ok(Json(shared))
}

/// GET /
#[instrument(skip_all)]
async fn list_stories(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<StorySummary>>, ApiError> {
    let gateway = state.gateway(identity.as_ref())?;
    let summaries = query_handlers::list_library(&gateway).await?;
    Ok(Json(summaries))
}

/// GET /{id}
///
/// A live session's copy wins over the stored one.
#[instrument(skip(state, identity), fields(story_id = %story_id))]
async fn get_story(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(story_id): Path<Uuid>,
) -> Result<Json<Story>, ApiError> {
    if let Some(session) = state.live_session(identity.as_ref(), story_id).await {
        return Ok(Json(session.snapshot().await));
    }
    let gateway = state.gateway(identity.as_ref())?;
    let story = query_handlers::get_story(&gateway, story_id).await?;
    Ok(Json(story))
}

/// Returns the router for stories.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stories).post(create_story))
        .route("/stream", post(create_story_stream))
        .route("/{id}", get(get_story).delete(delete_story))
        .route("/{id}/continue", post(continue_story))
        .route("/{id}/continue/stream", post(continue_story_stream))
        .route("/{id}/save", post(save_story))
        .route("/{id}/share", post(share_story))
}
