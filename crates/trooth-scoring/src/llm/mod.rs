//! Text-completion client seam.
//!
//! Scorers only see [`LlmClient`]; provider adapters classify their failures
//! into an [`ErrorKind`] so retry decisions never depend on message text.

mod fallback;
mod openai;

pub use fallback::{client_from_config, FallbackClient};
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat-style completion client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier used for requests and logs.
    fn model(&self) -> &str;

    /// Generate a single non-streaming completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Request for one completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user)],
            temperature: 1.0,
            max_tokens: 1024,
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Ask the provider for a JSON object body.
    pub fn with_json_output(mut self) -> Self {
        self.response_format = ResponseFormat::JsonObject;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: Usage::default(),
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Failure class used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    RateLimited,
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("provider throttled the request: {0}")]
    RateLimited(String),
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("provider rejected the request: {0}")]
    Permanent(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::RateLimited(_) => ErrorKind::RateLimited,
            LlmError::Transient(_) => ErrorKind::Transient,
            LlmError::Permanent(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Permanent
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let detail = format!("HTTP {status}: {}", body.into());
        match status {
            429 => LlmError::RateLimited(detail),
            408 | 409 | 425 => LlmError::Transient(detail),
            500..=599 => LlmError::Transient(detail),
            _ => LlmError::Permanent(detail),
        }
    }
}
