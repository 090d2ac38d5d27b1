//! # Service Configuration Model
//!
//! Describes how to reach an execution backend: a real HTTP endpoint or a
//! mock definition. Authentication is a tagged JSONB descriptor; extra
//! headers are merged into outbound requests regardless of the primary
//! scheme. Owned by administrators; the worker only reads these rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Backend kind for a service configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Real outbound HTTP call
    Real,
    /// Simulated call using a mock template or inline definition
    Mock,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real" => Ok(Self::Real),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Invalid service kind: {s}")),
        }
    }
}

/// Authentication descriptor, stored as tagged JSONB.
///
/// Exactly one primary scheme applies per configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum AuthDescriptor {
    #[default]
    None,
    /// `X-API-Key: <key>`
    ApiKey { key: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// `Authorization: Basic <base64(user:pass)>`
    Basic { username: String, password: String },
    /// Caller-specified header/value pair
    CustomHeader { name: String, value: String },
}

/// One configured execution target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ServiceConfiguration {
    pub id: Uuid,
    pub name: String,
    /// `real` or `mock`
    pub kind: String,
    /// Endpoint URL; required for `real` configurations
    pub url: Option<String>,
    pub http_method: String,
    pub timeout_seconds: i32,
    pub max_retries: i32,
    /// Tagged [`AuthDescriptor`] JSONB
    pub auth: Value,
    /// Extra headers merged regardless of the primary auth scheme
    pub extra_headers: Option<Value>,
    /// Named mock template code (`mock` only)
    pub mock_template: Option<String>,
    /// Inline mock definition (`mock` only); wins over `mock_template`
    pub mock_definition: Option<Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New service configuration for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewServiceConfiguration {
    pub name: String,
    pub kind: ServiceKind,
    pub url: Option<String>,
    pub http_method: String,
    pub timeout_seconds: i32,
    pub max_retries: i32,
    pub auth: AuthDescriptor,
    pub extra_headers: Option<HashMap<String, String>>,
    pub mock_template: Option<String>,
    pub mock_definition: Option<Value>,
}

impl ServiceConfiguration {
    /// Parsed backend kind
    pub fn kind(&self) -> Result<ServiceKind, String> {
        self.kind.parse()
    }

    /// Deserialized authentication descriptor
    pub fn auth_descriptor(&self) -> Result<AuthDescriptor, serde_json::Error> {
        serde_json::from_value(self.auth.clone())
    }

    /// Extra headers as a flat map; absent and malformed both yield empty
    pub fn extra_header_map(&self) -> HashMap<String, String> {
        self.extra_headers
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub async fn create(
        pool: &PgPool,
        new_config: NewServiceConfiguration,
    ) -> Result<ServiceConfiguration, sqlx::Error> {
        let auth = serde_json::to_value(&new_config.auth).unwrap_or(Value::Null);
        let extra_headers = new_config
            .extra_headers
            .map(|h| serde_json::to_value(h).unwrap_or(Value::Null));

        sqlx::query_as::<_, ServiceConfiguration>(
            r#"
            INSERT INTO service_configurations (
                id, name, kind, url, http_method, timeout_seconds, max_retries,
                auth, extra_headers, mock_template, mock_definition, active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, true, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_config.name)
        .bind(new_config.kind.to_string())
        .bind(new_config.url)
        .bind(new_config.http_method)
        .bind(new_config.timeout_seconds)
        .bind(new_config.max_retries)
        .bind(auth)
        .bind(extra_headers)
        .bind(new_config.mock_template)
        .bind(new_config.mock_definition)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ServiceConfiguration>, sqlx::Error> {
        sqlx::query_as::<_, ServiceConfiguration>(
            "SELECT * FROM service_configurations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<ServiceConfiguration>, sqlx::Error> {
        sqlx::query_as::<_, ServiceConfiguration>(
            "SELECT * FROM service_configurations WHERE active = true ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_descriptor_tagged_serde() {
        let auth = AuthDescriptor::Bearer {
            token: "tok-123".to_string(),
        };
        let value = serde_json::to_value(&auth).unwrap();
        assert_eq!(value["scheme"], "bearer");
        assert_eq!(value["token"], "tok-123");

        let parsed: AuthDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, auth);
    }

    #[test]
    fn test_auth_descriptor_default_is_none() {
        assert_eq!(AuthDescriptor::default(), AuthDescriptor::None);
        let parsed: AuthDescriptor = serde_json::from_value(json!({"scheme": "none"})).unwrap();
        assert_eq!(parsed, AuthDescriptor::None);
    }

    #[test]
    fn test_service_kind_round_trip() {
        assert_eq!("mock".parse::<ServiceKind>().unwrap(), ServiceKind::Mock);
        assert_eq!(ServiceKind::Real.to_string(), "real");
        assert!("fake".parse::<ServiceKind>().is_err());
    }
}
