//! # AI Model Client Family
//!
//! One client per provider, all implementing [`ModelClient`]. Clients absorb
//! the differences between provider wire formats and normalize every failure
//! — network, timeout, non-2xx, parse — into an error-valued
//! [`CompletionResponse`], so callers never need provider-specific error
//! handling.
//!
//! ## Providers
//!
//! [`Provider`] is a closed enum: adding a fifth provider without updating
//! the factory and the client constructors is a compile error.

pub mod anthropic;
pub mod factory;
pub mod json_extract;
pub mod mistral;
pub mod ollama;
pub mod openai;
pub mod pricing;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use factory::{ModelClientFactory, ResolvedClient};
pub use json_extract::extract_json;
pub use mistral::MistralClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Hard per-attempt deadline applied by every client; a hung provider must
/// never block the worker loop
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Supported AI providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Mistral,
    Ollama,
}

impl Provider {
    /// Environment variable holding the fallback credential for this provider
    pub fn env_credential_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Mistral => "MISTRAL_API_KEY",
            Self::Ollama => "OLLAMA_API_KEY",
        }
    }

    /// Default API base URL
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com",
            Self::Mistral => "https://api.mistral.ai",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::Mistral => write!(f, "mistral"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "mistral" => Ok(Self::Mistral),
            "ollama" => Ok(Self::Ollama),
            _ => Err(format!(
                "Unknown provider: '{s}'. Available: anthropic, openai, mistral, ollama"
            )),
        }
    }
}

/// Coarse request classification used to pick a default model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    #[default]
    Standard,
    Complex,
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }
}

/// Per-call options layered over the client's defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOptions {
    /// Explicit model name; wins over the client default
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Normalized result of one completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub success: bool,
    /// Raw model text
    pub content: String,
    /// Parsed JSON payload, present after a successful JSON-mode call
    pub data: Option<Value>,
    pub error: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    /// Approximate cost in USD from the static price table
    pub cost_usd: f64,
    pub duration_ms: u64,
}

impl CompletionResponse {
    /// Create a successful raw-text response
    pub fn success(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            data: None,
            error: None,
            model: model.into(),
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            duration_ms: 0,
        }
    }

    /// Create a failed response
    pub fn failure(error: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            data: None,
            error: Some(error.into()),
            model: model.into(),
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            duration_ms: 0,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Shared completion-call contract implemented by every provider client
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// The provider this client talks to
    fn provider(&self) -> Provider;

    /// The model used when the call options do not name one
    fn default_model(&self) -> &str;

    /// Map a complexity tier to a provider-specific model name
    fn select_model(&self, complexity: Complexity) -> String;

    /// Execute a raw text completion with the client's retry policy applied
    async fn execute_raw(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ModelOptions,
    ) -> CompletionResponse;

    /// Execute a completion and extract/parse JSON from the raw text.
    ///
    /// Parse failure downgrades an otherwise-successful call to a failed
    /// response with a `Failed to parse JSON: ...` error.
    async fn execute_for_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ModelOptions,
    ) -> CompletionResponse {
        let mut response = self.execute_raw(system_prompt, user_prompt, options).await;
        if !response.success {
            return response;
        }
        match extract_json(&response.content) {
            Ok(value) => {
                response.data = Some(value);
                response
            }
            Err(e) => {
                response.success = false;
                response.error = Some(e);
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip() {
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(Provider::Mistral.to_string(), "mistral");
        assert!("gemini".parse::<Provider>().is_err());
    }

    #[test]
    fn test_env_credential_vars() {
        assert_eq!(Provider::Anthropic.env_credential_var(), "ANTHROPIC_API_KEY");
        assert_eq!(Provider::Ollama.env_credential_var(), "OLLAMA_API_KEY");
    }

    #[test]
    fn test_token_usage_totals() {
        let usage = TokenUsage::new(120, 80);
        assert_eq!(usage.total_tokens, 200);
    }

    #[test]
    fn test_completion_response_constructors() {
        let ok = CompletionResponse::success("hello", "test-model");
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = CompletionResponse::failure("boom", "test-model");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("boom"));
    }
}
