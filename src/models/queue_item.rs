//! # Queue Item Model
//!
//! The durable unit of deferred work. Each row references an owning task, an
//! owning workflow instance, and a target configuration (service or prompt),
//! and carries the retry budget the worker enforces.
//!
//! ## Claim Semantics
//!
//! At most one worker may hold an item in `running` state. This is enforced
//! by [`QueueItem::claim_next`], a single atomic statement using
//! `FOR UPDATE SKIP LOCKED` — never a read-then-update pair — so multiple
//! worker processes can poll the same table safely.
//!
//! ## Lifecycle
//!
//! `pending → running → {completed | pending (retry) | failed}`. Terminal
//! rows are never deleted by the worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::fmt;
use uuid::Uuid;

use crate::constants::QueueItemStatus;

/// Which configuration table the item's `config_id` points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    /// `config_id` references a [`super::ServiceConfiguration`]
    Service,
    /// `config_id` references a [`super::PromptTemplate`]
    Prompt,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

impl std::str::FromStr for ConfigKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(Self::Service),
            "prompt" => Ok(Self::Prompt),
            _ => Err(format!("Invalid config kind: {s}")),
        }
    }
}

/// One deferred, retryable unit of work awaiting execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QueueItem {
    pub id: i64,
    /// Owning workflow-instance id; key for resumption signals
    pub instance_id: Uuid,
    /// Owning task record whose status the worker mirrors
    pub task_id: Uuid,
    /// `service` or `prompt`
    pub config_kind: String,
    pub config_id: Uuid,
    pub input_data: Value,
    pub status: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
    /// Earliest claim time; pushed forward by retry backoff
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// New queue item for enqueueing (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueItem {
    pub instance_id: Uuid,
    pub task_id: Uuid,
    pub config_kind: ConfigKind,
    pub config_id: Uuid,
    pub input_data: Value,
    pub max_retries: i32,
}

impl NewQueueItem {
    /// Build an enqueue request with the default retry budget of 3
    pub fn new(
        instance_id: Uuid,
        task_id: Uuid,
        config_kind: ConfigKind,
        config_id: Uuid,
        input_data: Value,
    ) -> Self {
        Self {
            instance_id,
            task_id,
            config_kind,
            config_id,
            input_data,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Per-status queue depth counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}

impl QueueItem {
    /// Parsed status; rows only ever hold values written through
    /// [`QueueItemStatus`], so a parse failure indicates external corruption.
    pub fn status(&self) -> Result<QueueItemStatus, String> {
        self.status.parse()
    }

    /// Parsed configuration kind
    pub fn config_kind(&self) -> Result<ConfigKind, String> {
        self.config_kind.parse()
    }

    /// Insert a new pending item. Called by external enqueuers (the workflow
    /// engine); the worker itself never creates items.
    pub async fn enqueue(pool: &PgPool, new_item: NewQueueItem) -> Result<QueueItem, sqlx::Error> {
        sqlx::query_as::<_, QueueItem>(
            r#"
            INSERT INTO execution_queue (
                instance_id, task_id, config_kind, config_id, input_data,
                status, retry_count, max_retries, available_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(new_item.instance_id)
        .bind(new_item.task_id)
        .bind(new_item.config_kind.to_string())
        .bind(new_item.config_id)
        .bind(new_item.input_data)
        .bind(new_item.max_retries)
        .fetch_one(pool)
        .await
    }

    /// Atomically claim the next pending item, flipping it to `running`.
    ///
    /// Single statement: the CTE selects one claimable row with
    /// `FOR UPDATE SKIP LOCKED` and the UPDATE transitions it in the same
    /// transaction. Two concurrent workers can never claim the same row.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<QueueItem>, sqlx::Error> {
        sqlx::query_as::<_, QueueItem>(
            r#"
            WITH next_item AS (
                SELECT id
                FROM execution_queue
                WHERE status = 'pending'
                  AND available_at <= NOW()
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE execution_queue q
            SET status = 'running',
                started_at = NOW()
            FROM next_item
            WHERE q.id = next_item.id
            RETURNING q.*
            "#,
        )
        .fetch_optional(pool)
        .await
    }

    /// Mark an item terminally completed
    pub async fn mark_completed(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE execution_queue
            SET status = 'completed', completed_at = NOW(), error_message = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark an item terminally failed with its final error
    pub async fn mark_failed(pool: &PgPool, id: i64, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE execution_queue
            SET status = 'failed', completed_at = NOW(), error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Revert a failed attempt to `pending` for the next poll cycle,
    /// consuming one unit of retry budget and deferring the next claim by
    /// `delay_ms` of backoff.
    pub async fn release_for_retry(
        pool: &PgPool,
        id: i64,
        error: &str,
        delay_ms: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE execution_queue
            SET status = 'pending',
                retry_count = retry_count + 1,
                error_message = $2,
                available_at = NOW() + ($3 * INTERVAL '1 millisecond'),
                started_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(delay_ms as f64)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Revert items stuck in `running` beyond the threshold back to
    /// `pending`, consuming one attempt each. Recovers from worker crashes
    /// mid-execution. Returns the number of recovered items.
    pub async fn recover_stale(
        pool: &PgPool,
        threshold_seconds: u64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE execution_queue
            SET status = 'pending',
                retry_count = retry_count + 1,
                error_message = 'recovered from stale running state',
                started_at = NULL
            WHERE status = 'running'
              AND started_at < NOW() - ($1 * INTERVAL '1 second')
            "#,
        )
        .bind(threshold_seconds as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find an item by id
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<QueueItem>, sqlx::Error> {
        sqlx::query_as::<_, QueueItem>("SELECT * FROM execution_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Per-status queue depth, for operational visibility
    pub async fn stats(pool: &PgPool) -> Result<QueueStats, sqlx::Error> {
        sqlx::query_as::<_, QueueStats>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending')   AS pending,
                COUNT(*) FILTER (WHERE status = 'running')   AS running,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed')    AS failed
            FROM execution_queue
            "#,
        )
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_kind_round_trip() {
        assert_eq!(ConfigKind::Service.to_string(), "service");
        assert_eq!("prompt".parse::<ConfigKind>().unwrap(), ConfigKind::Prompt);
        assert!("widget".parse::<ConfigKind>().is_err());
    }

    #[test]
    fn test_new_item_defaults() {
        let item = NewQueueItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ConfigKind::Service,
            Uuid::new_v4(),
            json!({"city": "Berlin"}),
        );
        assert_eq!(item.max_retries, 3);

        let item = item.with_max_retries(5);
        assert_eq!(item.max_retries, 5);
    }
}
