//! Ollama vision-model backend.
//!
//! Sends the image bytes to `POST {host}/api/chat` as a single non-streaming
//! user message and returns `message.content` as the description.

use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{CaptionBackend, CaptionError};
use crate::cache::FileKey;

/// Default Ollama endpoint.
pub const DEFAULT_HOST: &str = "http://localhost:11434";
/// Default vision model.
pub const DEFAULT_MODEL: &str = "llava:7b";
/// Default instruction sent with each image.
pub const DEFAULT_PROMPT: &str = "Describe this image";

/// Connection settings for [`OllamaBackend`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    pub host: String,
    /// Model tag to run.
    pub model: String,
    /// Instruction sent alongside the image.
    pub prompt: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Blocking HTTP client for a local Ollama server.
#[derive(Debug)]
pub struct OllamaBackend {
    http: reqwest::blocking::Client,
    endpoint: String,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Build a backend for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptionError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self, CaptionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CaptionError::Transport(e.to_string()))?;
        let endpoint = format!("{}/api/chat", config.host.trim_end_matches('/'));

        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    /// Full URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CaptionBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn caption(&self, key: &FileKey) -> Result<String, CaptionError> {
        let bytes = std::fs::read(key.as_path()).map_err(|source| CaptionError::ReadInput {
            path: key.as_path().to_path_buf(),
            source,
        })?;

        let request = ChatRequest {
            model: &self.config.model,
            stream: false,
            messages: vec![ChatMessage {
                role: "user",
                content: &self.config.prompt,
                images: vec![base64::engine::general_purpose::STANDARD.encode(bytes)],
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| CaptionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CaptionError::Status {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        let body = response
            .text()
            .map_err(|e| CaptionError::Transport(e.to_string()))?;
        parse_chat_response(&body)
    }
}

/// Extract the description from an `/api/chat` response body.
fn parse_chat_response(body: &str) -> Result<String, CaptionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| CaptionError::MalformedResponse(e.to_string()))?;
    let content = parsed
        .message
        .ok_or_else(|| CaptionError::MalformedResponse("missing `message` field".into()))?
        .content;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CaptionError::EmptyDescription);
    }
    Ok(trimmed.to_string())
}
