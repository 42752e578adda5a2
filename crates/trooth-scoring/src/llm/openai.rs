use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, ResponseFormat, Usage};
use crate::config::LlmConfig;

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LlmError::Permanent(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Builds a client when credentials are configured, `None` selects offline scoring.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, LlmError> {
        let Some(api_key) = config.api_key() else {
            return Ok(None);
        };
        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_seconds),
        )
        .map(Some)
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatRequest>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormatRequest {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsageResponse>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn classify_transport(err: reqwest::Error) -> LlmError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        LlmError::Transient(err.to_string())
    } else {
        LlmError::Permanent(err.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|message| ChatMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: match request.response_format {
                ResponseFormat::JsonObject => Some(ResponseFormatRequest {
                    format_type: "json_object",
                }),
                ResponseFormat::Text => None,
            },
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.chat_completions_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Transient(format!("unreadable completion body: {err}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Transient("completion contained no choices".to_string()))?;

        let usage = chat
            .usage
            .map(|usage| Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            })
            .unwrap_or_default();

        debug!(
            model = %self.model,
            latency_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion received"
        );

        Ok(CompletionResponse { content, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = OpenAiClient::new(
            "http://localhost:8000/v1/",
            "gpt-4o-mini",
            "sk-test",
            Duration::from_secs(5),
        )
        .expect("client builds");
        assert_eq!(
            client.chat_completions_url(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn unconfigured_key_selects_offline_mode() {
        let config = LlmConfig {
            api_key: Some("your_openai_key".to_string()),
            ..LlmConfig::default()
        };
        let client = OpenAiClient::from_config(&config).expect("config is usable");
        assert!(client.is_none());
    }
}
