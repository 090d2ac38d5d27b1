//! # Mistral Model Client
//!
//! Talks to the Mistral chat completions API (OpenAI-compatible wire shape,
//! different host and model catalogue). Requires an API key from the
//! configured interface record or the `MISTRAL_API_KEY` environment fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use super::pricing::cost_for;
use super::retry::{with_retries, CallFailure, RetryPolicy};
use super::{
    CompletionResponse, Complexity, ModelClient, ModelOptions, Provider, TokenUsage,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::error::{EngineError, Result};

const DEFAULT_MODEL: &str = "mistral-large-latest";

/// Mistral API client
pub struct MistralClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    policy: RetryPolicy,
    timeout: Duration,
}

impl MistralClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: Provider::Mistral.default_base_url().to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            policy: RetryPolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Construct from the `MISTRAL_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("MISTRAL_API_KEY")
            .map_err(|_| EngineError::model_client("mistral", "MISTRAL_API_KEY is not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn attempt(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        options: &ModelOptions,
    ) -> std::result::Result<(String, TokenUsage), CallFailure> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_prompt.to_string(),
        });

        let payload = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CallFailure::new(format!("request failed: {e}"), None))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CallFailure::new(format!("failed to read response: {e}"), Some(status)))?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(CallFailure::new(message, Some(status)));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CallFailure::new(format!("malformed response: {e}"), Some(status)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CallFailure::new("response contained no choices", Some(status)))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        Ok((content, usage))
    }
}

#[async_trait]
impl ModelClient for MistralClient {
    fn provider(&self) -> Provider {
        Provider::Mistral
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn select_model(&self, complexity: Complexity) -> String {
        match complexity {
            Complexity::Simple => "mistral-small-latest".to_string(),
            Complexity::Standard => "mistral-medium-latest".to_string(),
            Complexity::Complex => "mistral-large-latest".to_string(),
        }
    }

    async fn execute_raw(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ModelOptions,
    ) -> CompletionResponse {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let started = Instant::now();

        debug!(provider = "mistral", model = %model, "Executing completion");

        let result = with_retries(&self.policy, "mistral", |_| async {
            match tokio::time::timeout(
                self.timeout,
                self.attempt(&model, system_prompt, user_prompt, options),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(CallFailure::new(
                    format!("request timed out after {}s", self.timeout.as_secs()),
                    None,
                )),
            }
        })
        .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok((content, usage)) => CompletionResponse::success(content, &model)
                .with_usage(usage)
                .with_cost(cost_for(&model, &usage))
                .with_duration(duration_ms),
            Err(failure) => {
                CompletionResponse::failure(failure.message, &model).with_duration(duration_ms)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selection_by_complexity() {
        let client = MistralClient::new("key");
        assert_eq!(client.select_model(Complexity::Simple), "mistral-small-latest");
        assert_eq!(
            client.select_model(Complexity::Standard),
            "mistral-medium-latest"
        );
        assert_eq!(client.select_model(Complexity::Complex), "mistral-large-latest");
    }
}
