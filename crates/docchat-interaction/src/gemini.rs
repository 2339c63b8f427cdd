//! GeminiClient - Direct REST implementation of the inference backend.
//!
//! This client calls the Gemini REST API directly. Configuration is an
//! explicit [`GeminiConfig`] passed to the constructor, never a hidden
//! global; an API key can be loaded from the environment or from
//! `~/.config/docchat/secret.json`.

use crate::config::SecretConfig;
use async_trait::async_trait;
use docchat_core::conversation::{Role, Turn, TurnPart};
use docchat_core::error::InferenceError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model used when the configuration does not name one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Timeout applied to a single `generateContent` call when the
/// configuration does not override it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Environment variable checked before the secret file.
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// The sole network-calling seam of the session core.
///
/// [`GeminiClient`] is the production implementation; tests substitute
/// their own backends.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Issues exactly one request to the backend and classifies the
    /// outcome. Never retries.
    async fn generate(&self, request: GenerateContentRequest) -> Result<Turn, InferenceError>;
}

/// Explicit configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key carried as a query parameter.
    pub api_key: String,
    /// Model identifier, e.g. `gemini-2.5-flash`.
    pub model: String,
    /// Per-request timeout. The core performs no retries; a timed-out
    /// call surfaces as a transport error.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Creates a configuration with the default model and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new client with the provided configuration.
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Loads configuration from the `GEMINI_API_KEY` environment variable,
    /// falling back to `~/.config/docchat/secret.json`.
    ///
    /// # Errors
    ///
    /// [`InferenceError::MissingCredential`] when neither source yields a
    /// usable key.
    pub fn try_from_env() -> Result<Self, InferenceError> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !credential_missing(&key) {
                return Ok(Self::new(GeminiConfig::new(key)));
            }
        }

        let config = SecretConfig::load()?.into_gemini_config()?;
        if credential_missing(&config.api_key) {
            return Err(InferenceError::MissingCredential);
        }
        Ok(Self::new(config))
    }

    /// Overrides the endpoint base URL (local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send_request(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<Turn, InferenceError> {
        // Bounds the whole exchange: connect, headers, and body read. A
        // backend that stalls mid-body still resolves within the timeout.
        tokio::time::timeout(self.config.timeout, self.exchange(request))
            .await
            .unwrap_or_else(|_| {
                Err(InferenceError::transport(format!(
                    "request timed out after {}s",
                    self.config.timeout.as_secs()
                )))
            })
    }

    async fn exchange(&self, request: &GenerateContentRequest) -> Result<Turn, InferenceError> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            self.base_url,
            model = self.config.model,
            api_key = self.config.api_key
        );

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| InferenceError::unexpected(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(InferenceError::Transport(error_message(status, &body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| InferenceError::unexpected(format!("malformed response body: {err}")))?;

        classify_response(parsed)
    }
}

#[async_trait]
impl InferenceBackend for GeminiClient {
    async fn generate(&self, request: GenerateContentRequest) -> Result<Turn, InferenceError> {
        // Short-circuit before any network call.
        if credential_missing(&self.config.api_key) {
            return Err(InferenceError::MissingCredential);
        }

        tracing::debug!(model = %self.config.model, turns = request.contents.len(), "calling generateContent");
        self.send_request(&request).await
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Request body for `generateContent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

/// One conversational turn on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// One content fragment on the wire: text or inline binary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        inline_data: InlineData,
    },
}

/// Base64 payload tagged with its media type (no envelope prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Wire role string for a transcript turn.
pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

// ============================================================================
// Response classification
// ============================================================================

/// Maps a decoded backend response onto a model turn or an error.
///
/// A response with no candidates, or whose first candidate carries no text
/// (e.g. safety filtering), classifies as [`InferenceError::EmptyResponse`]
/// with the reported finish reason, defaulting to `"unknown"`.
fn classify_response(response: GenerateContentResponse) -> Result<Turn, InferenceError> {
    let candidate = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or_else(|| InferenceError::EmptyResponse("unknown".to_string()))?;

    let reason = candidate
        .finish_reason
        .unwrap_or_else(|| "unknown".to_string());

    let parts: Vec<TurnPart> = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .map(TurnPart::Text)
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        return Err(InferenceError::EmptyResponse(reason));
    }

    Ok(Turn {
        role: Role::Model,
        parts,
    })
}

/// Derives a user-readable message from a non-success response, preferring
/// the backend's structured `{"error": {"message"}}` body.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| status.to_string())
}

/// Whether the key is absent or an obvious placeholder.
fn credential_missing(api_key: &str) -> bool {
    let key = api_key.trim();
    key.is_empty() || key == "YOUR_API_KEY" || key.starts_with('<')
}
