//! # Model Client Factory
//!
//! Resolves which client to construct from a persisted
//! [`ModelInterface`](crate::models::ModelInterface) record, decrypting its
//! stored credential, with an environment-variable fallback when no active
//! record exists.
//!
//! ## Failure semantics
//!
//! - More than one active default for a provider is a configuration-integrity
//!   error — no tie-break rule is invented.
//! - A missing `ENCRYPTION_KEY` is a hard configuration error and is never
//!   downgraded to the environment fallback.
//! - A bad ciphertext (decryption failure with the key present) IS downgraded
//!   to the environment fallback, with a warning.

use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    AnthropicClient, MistralClient, ModelClient, OllamaClient, OpenAiClient, Provider,
};
use crate::config::EngineConfig;
use crate::crypto::decrypt_credential;
use crate::error::{EngineError, Result};
use crate::models::ModelInterface;

/// Resolves AI clients from persisted configuration
pub struct ModelClientFactory {
    pool: PgPool,
}

/// A resolved client together with the record that produced it (if any)
pub struct ResolvedClient {
    pub client: Box<dyn ModelClient>,
    /// The interface record used; `None` when the environment fallback applied
    pub interface_id: Option<Uuid>,
    /// The interface record's default model, when it declares one. Kept
    /// separate from the client default so model resolution can fall through
    /// to the template's default.
    pub interface_default_model: Option<String>,
}

impl ModelClientFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a client for `provider`, optionally pinned to a specific
    /// interface record.
    pub async fn resolve(
        &self,
        provider: Provider,
        interface_id: Option<Uuid>,
    ) -> Result<ResolvedClient> {
        let record = match interface_id {
            Some(id) => ModelInterface::find_by_id(&self.pool, id).await?,
            None => {
                let defaults = ModelInterface::find_active_defaults(&self.pool, provider).await?;
                if defaults.len() > 1 {
                    return Err(EngineError::integrity(format!(
                        "{} active default model interfaces found for provider '{provider}'; expected at most one",
                        defaults.len()
                    )));
                }
                defaults.into_iter().next()
            }
        };

        let Some(record) = record.filter(|r| r.active) else {
            debug!(%provider, "No active model interface record; using environment fallback");
            return Ok(ResolvedClient {
                client: Self::from_environment(provider)?,
                interface_id: None,
                interface_default_model: None,
            });
        };

        let record_provider = record
            .provider()
            .map_err(EngineError::integrity)?;
        if record_provider != provider {
            return Err(EngineError::integrity(format!(
                "model interface {} is configured for provider '{record_provider}', not '{provider}'",
                record.id
            )));
        }

        // Missing key is a hard error; the fallback below only covers bad
        // ciphertext.
        let key = EngineConfig::encryption_key()?;
        match decrypt_credential(&key, &record.encrypted_credential) {
            Ok(credential) => Ok(ResolvedClient {
                client: Self::build_client(
                    provider,
                    credential,
                    record.base_url.clone(),
                    record.default_model.clone(),
                ),
                interface_id: Some(record.id),
                interface_default_model: record.default_model.clone(),
            }),
            Err(e) => {
                warn!(
                    %provider,
                    interface_id = %record.id,
                    error = %e,
                    "Credential decryption failed; falling back to environment credentials"
                );
                Ok(ResolvedClient {
                    client: Self::from_environment(provider)?,
                    interface_id: None,
                    interface_default_model: None,
                })
            }
        }
    }

    /// Construct a client for `provider` with an explicit credential.
    ///
    /// Exhaustive over [`Provider`]; a new provider variant will not compile
    /// until it is handled here.
    pub fn build_client(
        provider: Provider,
        credential: String,
        base_url: Option<String>,
        default_model: Option<String>,
    ) -> Box<dyn ModelClient> {
        match provider {
            Provider::Anthropic => {
                let mut client = AnthropicClient::new(credential);
                if let Some(url) = base_url {
                    client = client.with_base_url(url);
                }
                if let Some(model) = default_model {
                    client = client.with_default_model(model);
                }
                Box::new(client)
            }
            Provider::OpenAi => {
                let mut client = OpenAiClient::new(credential);
                if let Some(url) = base_url {
                    client = client.with_base_url(url);
                }
                if let Some(model) = default_model {
                    client = client.with_default_model(model);
                }
                Box::new(client)
            }
            Provider::Mistral => {
                let mut client = MistralClient::new(credential);
                if let Some(url) = base_url {
                    client = client.with_base_url(url);
                }
                if let Some(model) = default_model {
                    client = client.with_default_model(model);
                }
                Box::new(client)
            }
            Provider::Ollama => {
                let mut client = OllamaClient::new().with_api_key(credential);
                if let Some(url) = base_url {
                    client = client.with_base_url(url);
                }
                if let Some(model) = default_model {
                    client = client.with_default_model(model);
                }
                Box::new(client)
            }
        }
    }

    /// Construct a client from process environment variables
    pub fn from_environment(provider: Provider) -> Result<Box<dyn ModelClient>> {
        Ok(match provider {
            Provider::Anthropic => Box::new(AnthropicClient::from_env()?),
            Provider::OpenAi => Box::new(OpenAiClient::from_env()?),
            Provider::Mistral => Box::new(MistralClient::from_env()?),
            Provider::Ollama => Box::new(OllamaClient::from_env()),
        })
    }
}
