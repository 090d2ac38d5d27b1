//! # Resumption Signal Model
//!
//! Insert-only queue keyed by workflow-instance id. The worker inserts a
//! signal when a queue item completes successfully; the external workflow
//! engine consumes signals to continue past the completed task. Terminal
//! failures do not signal — the workflow engine detects those via task status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One workflow-resumption notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResumptionSignal {
    pub id: i64,
    pub instance_id: Uuid,
    pub task_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ResumptionSignal {
    /// Enqueue a resumption signal for the owning workflow instance
    pub async fn enqueue(
        pool: &PgPool,
        instance_id: Uuid,
        task_id: Uuid,
    ) -> Result<ResumptionSignal, sqlx::Error> {
        sqlx::query_as::<_, ResumptionSignal>(
            r#"
            INSERT INTO resumption_signals (instance_id, task_id, created_at)
            VALUES ($1, $2, NOW())
            RETURNING *
            "#,
        )
        .bind(instance_id)
        .bind(task_id)
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_instance(
        pool: &PgPool,
        instance_id: Uuid,
    ) -> Result<Vec<ResumptionSignal>, sqlx::Error> {
        sqlx::query_as::<_, ResumptionSignal>(
            "SELECT * FROM resumption_signals WHERE instance_id = $1 ORDER BY created_at",
        )
        .bind(instance_id)
        .fetch_all(pool)
        .await
    }
}
