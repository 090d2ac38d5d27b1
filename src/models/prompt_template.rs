//! # Prompt Template Model
//!
//! Named, versioned prompt definitions. Templates are referenced by `code`
//! from execution requests; `user_prompt` carries `{{variable}}` placeholders
//! filled in by the renderer. Input and output JSON Schemas gate execution
//! and downgrade schema-mismatched model output to failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::fmt;
use uuid::Uuid;

/// Declared output format of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Model output is extracted and parsed as JSON
    Json,
    Markdown,
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Markdown => write!(f, "markdown"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "markdown" => Ok(Self::Markdown),
            "text" => Ok(Self::Text),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// A named, versioned prompt definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PromptTemplate {
    pub id: Uuid,
    /// Unique reference code; execution requests use this, never the id
    pub code: String,
    pub category: Option<String>,
    pub system_prompt: String,
    /// Contains `{{variable}}` placeholders
    pub user_prompt: String,
    /// Default model interface; resolution order is
    /// context override > interface default model > this template's default
    pub model_interface_id: Option<Uuid>,
    pub default_model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    /// `json`, `markdown`, or `text`
    pub output_format: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New prompt template for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPromptTemplate {
    pub code: String,
    pub category: Option<String>,
    pub system_prompt: String,
    pub user_prompt: String,
    pub model_interface_id: Option<Uuid>,
    pub default_model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub output_format: OutputFormat,
}

impl PromptTemplate {
    /// Parsed output format
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.output_format.parse()
    }

    pub async fn create(
        pool: &PgPool,
        new_template: NewPromptTemplate,
    ) -> Result<PromptTemplate, sqlx::Error> {
        sqlx::query_as::<_, PromptTemplate>(
            r#"
            INSERT INTO prompt_templates (
                id, code, category, system_prompt, user_prompt,
                model_interface_id, default_model, temperature, max_tokens,
                input_schema, output_schema, output_format, active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, true, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_template.code)
        .bind(new_template.category)
        .bind(new_template.system_prompt)
        .bind(new_template.user_prompt)
        .bind(new_template.model_interface_id)
        .bind(new_template.default_model)
        .bind(new_template.temperature)
        .bind(new_template.max_tokens)
        .bind(new_template.input_schema)
        .bind(new_template.output_schema)
        .bind(new_template.output_format.to_string())
        .fetch_one(pool)
        .await
    }

    /// Fetch by unique code among active templates
    pub async fn find_by_code(
        pool: &PgPool,
        code: &str,
    ) -> Result<Option<PromptTemplate>, sqlx::Error> {
        sqlx::query_as::<_, PromptTemplate>(
            "SELECT * FROM prompt_templates WHERE code = $1 AND active = true",
        )
        .bind(code)
        .fetch_optional(pool)
        .await
    }

    /// Fetch by id; used by the queue worker, which holds a config id
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<PromptTemplate>, sqlx::Error> {
        sqlx::query_as::<_, PromptTemplate>("SELECT * FROM prompt_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_round_trip() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
