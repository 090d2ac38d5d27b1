//! # Ollama Model Client
//!
//! Talks to a local or self-hosted Ollama server. No credential is required
//! by default; when one is configured it is sent as a bearer token for
//! reverse-proxied deployments. Local execution means zero token cost.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use super::retry::{with_retries, CallFailure, RetryPolicy};
use super::{
    CompletionResponse, Complexity, ModelClient, ModelOptions, Provider, TokenUsage,
    DEFAULT_REQUEST_TIMEOUT,
};

const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Ollama API client
pub struct OllamaClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    policy: RetryPolicy,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: None,
            base_url: Provider::Ollama.default_base_url().to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            policy: RetryPolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Construct from the environment. `OLLAMA_BASE_URL` overrides the
    /// local default; `OLLAMA_API_KEY` is optional.
    pub fn from_env() -> Self {
        let mut client = Self::new();
        if let Ok(base_url) = std::env::var("OLLAMA_BASE_URL") {
            client.base_url = base_url;
        }
        if let Ok(api_key) = std::env::var("OLLAMA_API_KEY") {
            client.api_key = Some(api_key);
        }
        client
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
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

        let payload = ChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let mut request = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
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
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(CallFailure::new(message, Some(status)));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| CallFailure::new(format!("malformed response: {e}"), Some(status)))?;

        let usage = TokenUsage::new(
            parsed.prompt_eval_count.unwrap_or(0),
            parsed.eval_count.unwrap_or(0),
        );
        Ok((parsed.message.content, usage))
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn select_model(&self, complexity: Complexity) -> String {
        match complexity {
            Complexity::Simple => "llama3.2:3b".to_string(),
            Complexity::Standard => "llama3.1:8b".to_string(),
            Complexity::Complex => "llama3.1:70b".to_string(),
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

        debug!(provider = "ollama", model = %model, "Executing completion");

        let result = with_retries(&self.policy, "ollama", |_| async {
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
                // Local models have no per-token price
                .with_cost(0.0)
                .with_duration(duration_ms),
            Err(failure) => {
                CompletionResponse::failure(failure.message, &model).with_duration(duration_ms)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selection_by_complexity() {
        let client = OllamaClient::new();
        assert_eq!(client.select_model(Complexity::Simple), "llama3.2:3b");
        assert_eq!(client.select_model(Complexity::Standard), "llama3.1:8b");
        assert_eq!(client.select_model(Complexity::Complex), "llama3.1:70b");
    }

    #[test]
    fn test_no_credential_required() {
        let client = OllamaClient::new();
        assert!(client.api_key.is_none());
    }

    #[tokio::test]
    async fn test_hung_server_fails_within_deadline() {
        // Accept the connection, then never respond
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(socket);
        });

        let client = OllamaClient::new()
            .with_base_url(format!("http://{addr}"))
            .with_timeout(Duration::from_millis(200))
            .with_retry_policy(RetryPolicy {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(10),
                jitter: false,
            });

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            client.execute_raw("", "hello", &ModelOptions::default()),
        )
        .await
        .expect("call must resolve well before the outer bound");

        assert!(!response.success);
        assert!(
            response.error.as_deref().unwrap_or("").contains("timed out"),
            "unexpected error: {:?}",
            response.error
        );
    }
}
