//! Scripted `TextService` for driving generation without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use pikfic_core::error::GenerationError;
use pikfic_generation::client::{ChunkStream, TextService};
use pikfic_generation::prompt::GenerationRequest;
use tokio::sync::Notify;

/// Replies with queued bodies in order and records every request it sees.
///
/// `stream` splits the next body into chunks of `chunk_chars` characters.
#[derive(Debug)]
pub struct ScriptedTextService {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    chunk_chars: usize,
}

impl ScriptedTextService {
    /// Create a service that returns `replies` one per call.
    #[must_use]
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            chunk_chars: 16,
        }
    }

    /// Shorthand for a service whose replies all succeed.
    #[must_use]
    pub fn with_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(bodies.into_iter().map(|body| Ok(body.into())).collect())
    }

    /// Returns a snapshot of the requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::Transport("no scripted reply left".into())))
    }
}

#[async_trait]
impl TextService for ScriptedTextService {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.next_reply(request)
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError> {
        let body = self.next_reply(request)?;
        let chars: Vec<char> = body.chars().collect();
        let chunks: Vec<Result<String, GenerationError>> = chars
            .chunks(self.chunk_chars)
            .map(|piece| Ok(piece.iter().collect()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Scripted service that parks every call until [`release`](Self::release).
#[derive(Debug)]
pub struct GatedTextService {
    inner: ScriptedTextService,
    entered: Notify,
    gate: Notify,
}

impl GatedTextService {
    /// Create a gated service that returns `replies` one per released call.
    #[must_use]
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            inner: ScriptedTextService::new(replies),
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    /// Resolves once a call is parked at the gate.
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one parked call through.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn pass_gate(&self) {
        self.entered.notify_one();
        self.gate.notified().await;
    }
}

#[async_trait]
impl TextService for GatedTextService {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.pass_gate().await;
        self.inner.complete(request).await
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError> {
        self.pass_gate().await;
        self.inner.stream(request).await
    }
}
