//! Generation client.
//!
//! `TextService` is the seam to the remote model. `GenerationClient` owns the
//! schema contract on top of it: every response, streamed or not, is checked
//! against the episode schema before anything reaches the state machine.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use pikfic_core::error::GenerationError;
use pikfic_story::domain::aggregates::EpisodeDraft;
use tracing::{debug, warn};

use crate::prompt::GenerationRequest;
use crate::scanner::ContentScanner;
use crate::schema;

/// Raw text fragments of a streamed response body, in order.
pub type ChunkStream = BoxStream<'static, Result<String, GenerationError>>;

/// The remote generative-text model.
#[async_trait]
pub trait TextService: Send + Sync {
    /// Sends the request and returns the whole response body.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Sends the request and returns the body as it arrives.
    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError>;
}

/// Schema-enforcing front end over a [`TextService`].
#[derive(Clone)]
pub struct GenerationClient {
    service: Arc<dyn TextService>,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient").finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Wraps a service implementation.
    #[must_use]
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self { service }
    }

    /// Generates one episode.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on transport failure or a response that does
    /// not satisfy the episode schema.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<EpisodeDraft, GenerationError> {
        let started = Instant::now();
        let result = match self.service.complete(request).await {
            Ok(body) => schema::parse_episode(&body, &request.expects),
            Err(e) => Err(e),
        };
        log_outcome(request, started, &result);
        result
    }

    /// Generates one episode, reporting the prose decoded so far to
    /// `observer` each time it grows.
    ///
    /// The observer sees advisory text only. The returned draft is parsed
    /// from the complete body.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the stream fails part way or the complete
    /// body does not satisfy the episode schema.
    pub async fn generate_streaming(
        &self,
        request: &GenerationRequest,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> Result<EpisodeDraft, GenerationError> {
        let started = Instant::now();
        let result = self.collect_stream(request, observer).await;
        log_outcome(request, started, &result);
        result
    }

    async fn collect_stream(
        &self,
        request: &GenerationRequest,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> Result<EpisodeDraft, GenerationError> {
        let mut chunks = self.service.stream(request).await?;
        let mut body = String::new();
        let mut scanner = ContentScanner::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            body.push_str(&chunk);
            if scanner.push(&chunk) {
                observer(scanner.content());
            }
        }
        schema::parse_episode(&body, &request.expects)
    }
}

fn log_outcome(
    request: &GenerationRequest,
    started: Instant,
    result: &Result<EpisodeDraft, GenerationError>,
) {
    let elapsed_ms = started.elapsed().as_millis();
    match result {
        Ok(draft) => debug!(
            episode = request.episode_number,
            stage = request.stage.label(),
            tier = ?request.model_tier,
            elapsed_ms,
            content_chars = draft.content.chars().count(),
            "episode generated"
        ),
        Err(e) => warn!(
            episode = request.episode_number,
            tier = ?request.model_tier,
            elapsed_ms,
            error = %e,
            "episode generation failed"
        ),
    }
}
