//! # Task Model
//!
//! Minimal owning-task record. The workflow engine creates tasks; the queue
//! worker only mirrors terminal queue-item outcomes onto them so the engine
//! can detect completion and terminal failure from task status alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::constants::TaskStatus;

/// One workflow task whose status the worker mirrors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub name: String,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Parsed status
    pub fn status(&self) -> Result<TaskStatus, String> {
        self.status.parse()
    }

    pub async fn create(
        pool: &PgPool,
        instance_id: Uuid,
        name: &str,
    ) -> Result<Task, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (id, instance_id, name, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(instance_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Mirror a queue-item outcome onto the owning task
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: TaskStatus,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, error_message = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }
}
