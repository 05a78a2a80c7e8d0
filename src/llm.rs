//! Completion providers.
//!
//! - **`openai`**: [`OpenAiCompletion`], chat completions against
//!   `{base_url}/chat/completions` with the shared retry policy.
//! - **`disabled`**: [`DisabledCompletion`], always unavailable; `ask`
//!   then fails with a backend-unavailable error after retrieval.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use noterag_core::llm::CompletionProvider;
use noterag_core::RagError;

use crate::config::{LlmConfig, OPENAI_API_KEY_ENV};
use crate::http::{client_with_timeout, send_json, JsonRequest};

/// Upper bound on the availability probe, independent of the completion timeout.
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_completion(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompletion::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        other => Err(RagError::Configuration(format!("unknown llm provider: {}", other)).into()),
    }
}

pub struct OpenAiCompletion {
    client: reqwest::Client,
    probe: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    label: String,
    max_tokens: u32,
    temperature: f32,
    max_retries: u32,
}

impl OpenAiCompletion {
    /// Requires `OPENAI_API_KEY` in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV).map_err(|_| {
            RagError::Configuration(format!("{} environment variable not set", OPENAI_API_KEY_ENV))
        })?;
        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            probe: client_with_timeout(AVAILABILITY_TIMEOUT.as_secs())?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            label: format!("openai:{}", config.model),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

/// First choice's message content; empty when the provider returned none.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let choices = json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices array"))?;
    Ok(choices
        .first()
        .and_then(|c| c.pointer("/message/content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        let request = JsonRequest::post(
            "OpenAI",
            format!("{}/chat/completions", self.base_url),
            &body,
        )
        .bearer(&self.api_key);
        let json = send_json(&self.client, &request, self.max_retries).await?;
        parse_chat_response(&json)
    }

    async fn check_availability(&self) -> bool {
        let request =
            JsonRequest::get("OpenAI", format!("{}/models", self.base_url)).bearer(&self.api_key);
        match send_json(&self.probe, &request, 0).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "completion provider unavailable");
                false
            }
        }
    }
}

/// Provider used when no LLM is configured.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        Err(RagError::unavailable("completion provider is disabled").into())
    }

    async fn check_availability(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": "Tuesday." } } ]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Tuesday.");
    }

    #[test]
    fn test_parse_chat_response_without_content() {
        let json = serde_json::json!({ "choices": [] });
        assert_eq!(parse_chat_response(&json).unwrap(), "");
        assert!(parse_chat_response(&serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider() {
        let provider = create_completion(&LlmConfig {
            provider: "disabled".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert!(!provider.check_availability().await);
        let err = provider.complete("s", "u").await.unwrap_err();
        assert!(noterag_core::is_backend_unavailable(&err));
    }
}
