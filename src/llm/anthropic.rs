//! # Anthropic Model Client
//!
//! Talks to the Anthropic Messages API. Requires an API key from the
//! configured [`ModelInterface`](crate::models::ModelInterface) record or
//! the `ANTHROPIC_API_KEY` environment fallback.

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

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 4_096;

/// Anthropic API client
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    policy: RetryPolicy,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: Provider::Anthropic.default_base_url().to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            policy: RetryPolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Construct from the `ANTHROPIC_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            EngineError::model_client("anthropic", "ANTHROPIC_API_KEY is not set")
        })?;
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
        let payload = MessagesRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: if system_prompt.is_empty() {
                None
            } else {
                Some(system_prompt.to_string())
            },
            messages: vec![Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            }],
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CallFailure::new(message, Some(status)));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| CallFailure::new(format!("malformed response: {e}"), Some(status)))?;

        let content = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let usage = TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens);
        Ok((content, usage))
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn select_model(&self, complexity: Complexity) -> String {
        match complexity {
            Complexity::Simple => "claude-3-5-haiku-latest".to_string(),
            Complexity::Standard => "claude-3-5-sonnet-latest".to_string(),
            Complexity::Complex => "claude-3-opus-latest".to_string(),
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

        debug!(provider = "anthropic", model = %model, "Executing completion");

        let result = with_retries(&self.policy, "anthropic", |_| async {
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
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
