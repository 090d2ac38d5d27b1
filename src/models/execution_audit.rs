//! # Execution Audit Model
//!
//! Append-only log of service-backend execution attempts made by the queue
//! worker: one row per attempt with payloads, timing, HTTP status, and the
//! attempt number. Never updated after insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One recorded execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionAudit {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub task_id: Uuid,
    pub config_id: Uuid,
    pub service_name: String,
    pub status: String,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub http_status: Option<i32>,
    /// 0-based retry attempt number at execution time
    pub attempt: i32,
    pub created_at: DateTime<Utc>,
}

/// New audit entry for appending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExecutionAudit {
    pub instance_id: Uuid,
    pub task_id: Uuid,
    pub config_id: Uuid,
    pub service_name: String,
    pub status: String,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub http_status: Option<i32>,
    pub attempt: i32,
}

impl ExecutionAudit {
    /// Append one attempt record
    pub async fn append(
        pool: &PgPool,
        entry: NewExecutionAudit,
    ) -> Result<ExecutionAudit, sqlx::Error> {
        sqlx::query_as::<_, ExecutionAudit>(
            r#"
            INSERT INTO execution_audits (
                id, instance_id, task_id, config_id, service_name, status,
                request_payload, response_payload, error_message,
                duration_ms, http_status, attempt, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.instance_id)
        .bind(entry.task_id)
        .bind(entry.config_id)
        .bind(entry.service_name)
        .bind(entry.status)
        .bind(entry.request_payload)
        .bind(entry.response_payload)
        .bind(entry.error_message)
        .bind(entry.duration_ms)
        .bind(entry.http_status)
        .bind(entry.attempt)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_task(
        pool: &PgPool,
        task_id: Uuid,
    ) -> Result<Vec<ExecutionAudit>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionAudit>(
            "SELECT * FROM execution_audits WHERE task_id = $1 ORDER BY created_at",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}
