//! Gemini `generateContent` implementation of [`TextService`].

use async_trait::async_trait;
use futures::StreamExt;
use pikfic_core::error::GenerationError;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ChunkStream, TextService};
use crate::prompt::{GenerationRequest, ModelTier};
use crate::schema;

/// Public endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for [`ModelTier::Major`] turns.
pub const DEFAULT_MAJOR_MODEL: &str = "gemini-2.5-flash";

/// Model used for [`ModelTier::Light`] turns.
pub const DEFAULT_LIGHT_MODEL: &str = "gemini-2.5-flash-lite";

/// Connection and sampling settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// API root. A trailing slash is ignored.
    pub base_url: String,
    /// Model for [`ModelTier::Major`] turns.
    pub major_model: String,
    /// Model for [`ModelTier::Light`] turns.
    pub light_model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens per request.
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    /// Settings with the public endpoint and default models.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            major_model: DEFAULT_MAJOR_MODEL.to_owned(),
            light_model: DEFAULT_LIGHT_MODEL.to_owned(),
            temperature: 0.8,
            max_output_tokens: 8192,
        }
    }

    fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Major => &self.major_model,
            ModelTier::Light => &self.light_model,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    system_instruction: ApiContent<'a>,
    contents: Vec<ApiContent<'a>>,
    generation_config: ApiGenerationConfig,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<ApiPart<'a>>,
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Deserialize)]
struct ApiCandidate {
    content: Option<ApiCandidateContent>,
}

#[derive(Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Vec<ApiCandidatePart>,
}

#[derive(Deserialize)]
struct ApiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl ApiResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// HTTP client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiService {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiService {
    /// Builds the service.
    ///
    /// No request timeout is set; a slow generation is allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Config` for a blank API key or an HTTP
    /// client that cannot be constructed.
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::Config("API key is empty".to_owned()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GenerationError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| GenerationError::Config(e.to_string()))?,
        );
        Ok(headers)
    }

    fn build_api_request<'a>(&self, request: &'a GenerationRequest) -> ApiRequest<'a> {
        ApiRequest {
            system_instruction: ApiContent {
                role: None,
                parts: vec![ApiPart {
                    text: &request.system_instruction,
                }],
            },
            contents: vec![ApiContent {
                role: Some("user"),
                parts: vec![ApiPart {
                    text: &request.user_prompt,
                }],
            }],
            generation_config: ApiGenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema::response_schema(&request.expects),
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    async fn send(
        &self,
        request: &GenerationRequest,
        method: &str,
    ) -> Result<reqwest::Response, GenerationError> {
        let url = format!(
            "{}/models/{}:{method}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model(request.model_tier)
        );
        let response = self
            .client
            .post(url)
            .headers(self.build_headers()?)
            .json(&self.build_api_request(request))
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Service { status, message });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextService for GeminiService {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let response = self.send(request, "generateContent").await?;
        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedJson(e.to_string()))?;
        Ok(api_response.text())
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError> {
        let response = self
            .send(request, "streamGenerateContent?alt=sse")
            .await?;

        // Bytes are buffered so that a multi-byte character split across
        // network chunks is only decoded once its line is complete.
        let stream = response
            .bytes_stream()
            .scan(Vec::new(), |buffer, result| {
                let chunks = match result {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        parse_sse_chunks_buffered(buffer)
                    }
                    Err(e) => vec![Err(GenerationError::Transport(e.to_string()))],
                };
                futures::future::ready(Some(chunks))
            })
            .flat_map(futures::stream::iter)
            .boxed();
        Ok(stream)
    }
}

/// Drains every complete `data:` line from `buffer` into text fragments.
fn parse_sse_chunks_buffered(buffer: &mut Vec<u8>) -> Vec<Result<String, GenerationError>> {
    let mut chunks = Vec::new();
    while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(&buffer[..newline_pos]).into_owned();
        let line = line.trim_end_matches('\r');
        if let Some(payload) = line.strip_prefix("data:").map(str::trim_start)
            && !payload.is_empty()
        {
            match serde_json::from_str::<ApiResponse>(payload) {
                Ok(event) => {
                    let text = event.text();
                    if !text.is_empty() {
                        chunks.push(Ok(text));
                    }
                }
                // A newline-terminated line is complete, so a truncated payload is garbage.
                Err(e) => chunks.push(Err(GenerationError::MalformedJson(format!(
                    "SSE parse error: {e}"
                )))),
            }
        }
        buffer.drain(..=newline_pos);
    }
    chunks
}
