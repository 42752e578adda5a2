use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAiClient};
use crate::config::LlmConfig;

/// Tries a secondary provider when the primary fails a request.
pub struct FallbackClient {
    primary: Arc<dyn LlmClient>,
    secondary: Option<Arc<dyn LlmClient>>,
}

impl FallbackClient {
    pub fn new(primary: Arc<dyn LlmClient>, secondary: Option<Arc<dyn LlmClient>>) -> Self {
        Self { primary, secondary }
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }
}

#[async_trait]
impl LlmClient for FallbackClient {
    fn model(&self) -> &str {
        self.primary.model()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let primary_err = match self.primary.complete(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };
        let Some(secondary) = &self.secondary else {
            return Err(primary_err);
        };

        warn!(
            primary = self.primary.model(),
            secondary = secondary.model(),
            error = %primary_err,
            "primary provider failed, trying fallback provider"
        );
        match secondary.complete(request).await {
            Ok(response) => Ok(response),
            Err(secondary_err) => {
                warn!(
                    secondary = secondary.model(),
                    error = %secondary_err,
                    "fallback provider failed"
                );
                // Report whichever failure still leaves room for a retry.
                if primary_err.is_retryable() {
                    Err(primary_err)
                } else {
                    Err(secondary_err)
                }
            }
        }
    }
}

/// Primary client from `config`, wrapped with the secondary provider when one
/// is configured. `None` selects offline scoring.
pub fn client_from_config(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>, LlmError> {
    let Some(primary) = OpenAiClient::from_config(config)? else {
        return Ok(None);
    };
    let primary: Arc<dyn LlmClient> = Arc::new(primary);

    let secondary = match config.fallback() {
        Some(fallback) => OpenAiClient::from_config(&fallback)?,
        None => None,
    };
    Ok(Some(match secondary {
        Some(secondary) => Arc::new(FallbackClient::new(primary, Some(Arc::new(secondary)))),
        None => primary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_is_built_only_with_its_own_key() {
        let mut config = LlmConfig {
            api_key: Some("sk-primary".to_string()),
            model: "gpt-4o-mini".to_string(),
            ..LlmConfig::default()
        };
        let client = client_from_config(&config)
            .expect("config is usable")
            .expect("primary configured");
        assert_eq!(client.model(), "gpt-4o-mini");
        assert!(config.fallback().is_none());

        config.fallback_api_key = Some("sk-secondary".to_string());
        config.fallback_model = Some("gpt-4o".to_string());
        let fallback = config.fallback().expect("fallback configured");
        assert_eq!(fallback.model, "gpt-4o");
        assert_eq!(fallback.base_url, config.base_url);
        assert!(client_from_config(&config)
            .expect("config is usable")
            .is_some());

        config.fallback_enabled = false;
        assert!(config.fallback().is_none());
    }
}
