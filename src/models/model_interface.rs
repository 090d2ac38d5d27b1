//! # Model Interface Model
//!
//! One configured AI provider endpoint: provider, encrypted credential,
//! optional custom base URL, and default model. At most one active record per
//! provider should carry `is_default = true`; the datastore does not enforce
//! this, so the client factory surfaces multiple defaults as a
//! configuration-integrity error at resolution time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::llm::Provider;

/// One configured AI provider endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ModelInterface {
    pub id: Uuid,
    /// Provider discriminator; parses into [`Provider`]
    pub provider: String,
    /// AES-GCM ciphertext, base64-encoded (see [`crate::crypto`])
    pub encrypted_credential: String,
    /// Custom API base URL; provider default when absent
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New model interface for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModelInterface {
    pub provider: Provider,
    pub encrypted_credential: String,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub is_default: bool,
}

impl ModelInterface {
    /// Parsed provider discriminator
    pub fn provider(&self) -> Result<Provider, String> {
        self.provider.parse()
    }

    pub async fn create(
        pool: &PgPool,
        new_interface: NewModelInterface,
    ) -> Result<ModelInterface, sqlx::Error> {
        sqlx::query_as::<_, ModelInterface>(
            r#"
            INSERT INTO model_interfaces (
                id, provider, encrypted_credential, base_url, default_model,
                active, is_default, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, true, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_interface.provider.to_string())
        .bind(new_interface.encrypted_credential)
        .bind(new_interface.base_url)
        .bind(new_interface.default_model)
        .bind(new_interface.is_default)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ModelInterface>, sqlx::Error> {
        sqlx::query_as::<_, ModelInterface>("SELECT * FROM model_interfaces WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All active records marked default for a provider.
    ///
    /// Returns a Vec rather than an Option so the caller can distinguish
    /// zero defaults (environment fallback) from multiple defaults
    /// (integrity violation).
    pub async fn find_active_defaults(
        pool: &PgPool,
        provider: Provider,
    ) -> Result<Vec<ModelInterface>, sqlx::Error> {
        sqlx::query_as::<_, ModelInterface>(
            r#"
            SELECT * FROM model_interfaces
            WHERE provider = $1 AND active = true AND is_default = true
            ORDER BY created_at
            "#,
        )
        .bind(provider.to_string())
        .fetch_all(pool)
        .await
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<ModelInterface>, sqlx::Error> {
        sqlx::query_as::<_, ModelInterface>(
            "SELECT * FROM model_interfaces WHERE active = true ORDER BY provider, created_at",
        )
        .fetch_all(pool)
        .await
    }
}
