//! # Prompt Execution Audit Model
//!
//! Append-only audit rows for AI-model invocations. A row is inserted in
//! `running` state before the model call and updated exactly once at
//! completion with status, token counts, cost, and duration. Audit writes are
//! best-effort: losing an audit row is preferable to losing a model response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::constants::ExecutionStatus;

/// One audited AI-model invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PromptExecution {
    pub id: Uuid,
    pub template_code: String,
    pub model_interface_id: Option<Uuid>,
    pub provider: String,
    pub model: String,
    pub rendered_system_prompt: String,
    pub rendered_user_prompt: String,
    pub raw_response: Option<String>,
    pub parsed_output: Option<Value>,
    pub status: String,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Completion data applied to a `running` row exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptExecutionOutcome {
    pub status: ExecutionStatus,
    pub raw_response: Option<String>,
    pub parsed_output: Option<Value>,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub cost_usd: Option<f64>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
}

impl PromptExecution {
    /// Insert the dispatch-time audit row in `running` state
    #[allow(clippy::too_many_arguments)]
    pub async fn create_running(
        pool: &PgPool,
        template_code: &str,
        model_interface_id: Option<Uuid>,
        provider: &str,
        model: &str,
        rendered_system_prompt: &str,
        rendered_user_prompt: &str,
    ) -> Result<PromptExecution, sqlx::Error> {
        sqlx::query_as::<_, PromptExecution>(
            r#"
            INSERT INTO prompt_executions (
                id, template_code, model_interface_id, provider, model,
                rendered_system_prompt, rendered_user_prompt, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'running', NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(template_code)
        .bind(model_interface_id)
        .bind(provider)
        .bind(model)
        .bind(rendered_system_prompt)
        .bind(rendered_user_prompt)
        .fetch_one(pool)
        .await
    }

    /// Apply the completion update. Guarded on `completed_at IS NULL` so a
    /// row can never be completed twice.
    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        outcome: PromptExecutionOutcome,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE prompt_executions
            SET status = $2,
                raw_response = $3,
                parsed_output = $4,
                prompt_tokens = $5,
                completion_tokens = $6,
                cost_usd = $7,
                duration_ms = $8,
                error_message = $9,
                completed_at = NOW()
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(outcome.status.to_string())
        .bind(outcome.raw_response)
        .bind(outcome.parsed_output)
        .bind(outcome.prompt_tokens)
        .bind(outcome.completion_tokens)
        .bind(outcome.cost_usd)
        .bind(outcome.duration_ms)
        .bind(outcome.error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<PromptExecution>, sqlx::Error> {
        sqlx::query_as::<_, PromptExecution>("SELECT * FROM prompt_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_template_code(
        pool: &PgPool,
        code: &str,
    ) -> Result<Vec<PromptExecution>, sqlx::Error> {
        sqlx::query_as::<_, PromptExecution>(
            "SELECT * FROM prompt_executions WHERE template_code = $1 ORDER BY created_at DESC",
        )
        .bind(code)
        .fetch_all(pool)
        .await
    }
}
