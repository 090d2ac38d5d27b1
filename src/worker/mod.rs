//! # Queue Worker
//!
//! The polling execution loop: claim one pending item at a time, dispatch it
//! to the matching backend (service call or prompt execution), record an
//! audit row, and settle the item — completed, released for a retried
//! attempt with backoff, or terminally failed.
//!
//! ## Settlement rules
//!
//! - Success: item `completed`, owning task mirrored to `completed`, and a
//!   resumption signal enqueued for the workflow engine.
//! - Retryable failure with budget left: item released back to `pending`
//!   with `available_at` pushed forward by exponential backoff.
//! - Non-retryable failure (4xx-class) or exhausted budget: item `failed`,
//!   task mirrored to `failed`, no signal.
//! - Infrastructure fault while processing: item `failed`. A fault must
//!   never leave an item stuck in `running`.
//!
//! Items orphaned in `running` by a crashed worker are swept back to
//! `pending` each tick by the stale-recovery pass.

use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::config::{RetryConfig, WorkerConfig};
use crate::constants::{ExecutionStatus, TaskStatus};
use crate::error::{EngineError, Result};
use crate::execution::{backend_for, BackendResponse};
use crate::llm::retry::{classify, CallFailure, FailureClass};
use crate::models::{
    ConfigKind, ExecutionAudit, NewExecutionAudit, PromptTemplate, QueueItem, ResumptionSignal,
    ServiceConfiguration, Task,
};
use crate::prompt::{ExecutionContext, PromptRunner};

/// Normalized result of one dispatch, independent of backend family
struct DispatchOutcome {
    success: bool,
    service_name: String,
    response_payload: Option<serde_json::Value>,
    error: Option<String>,
    http_status: Option<i32>,
    duration_ms: i64,
}

/// Polling worker that drains the execution queue
pub struct QueueWorker {
    pool: PgPool,
    worker_config: WorkerConfig,
    retry_config: RetryConfig,
    runner: PromptRunner,
}

impl QueueWorker {
    pub fn new(pool: PgPool, worker_config: WorkerConfig, retry_config: RetryConfig) -> Self {
        let runner = PromptRunner::new(pool.clone());
        Self {
            pool,
            worker_config,
            retry_config,
            runner,
        }
    }

    /// Run the polling loop until the process is stopped.
    ///
    /// Each tick recovers stale items, then drains every currently-claimable
    /// item before sleeping again.
    pub async fn run(&self) -> Result<()> {
        let worker_id = self
            .worker_config
            .worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4()));
        info!(
            worker_id = %worker_id,
            poll_interval_seconds = self.worker_config.poll_interval_seconds,
            "Queue worker started"
        );

        let mut ticker = tokio::time::interval(self.worker_config.poll_interval());
        loop {
            ticker.tick().await;

            match QueueItem::recover_stale(
                &self.pool,
                self.worker_config.stale_running_threshold_seconds,
            )
            .await
            {
                Ok(0) => {}
                Ok(recovered) => {
                    warn!(recovered, "Recovered items stuck in running state");
                }
                Err(e) => warn!(error = %e, "Stale item recovery failed"),
            }

            loop {
                match self.poll_once().await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => {
                        // Claim-level datastore faults; the item-level path
                        // settles its own failures.
                        error!(error = %e, "Poll cycle failed");
                        break;
                    }
                }
            }
        }
    }

    /// Claim and fully process at most one item.
    ///
    /// Returns whether an item was claimed, so callers can drain the queue.
    pub async fn poll_once(&self) -> Result<bool> {
        let Some(item) = QueueItem::claim_next(&self.pool).await? else {
            return Ok(false);
        };

        debug!(
            item_id = item.id,
            config_kind = %item.config_kind,
            retry_count = item.retry_count,
            "Claimed queue item"
        );

        match self.dispatch(&item).await {
            Ok(outcome) => {
                self.record_audit(&item, &outcome).await;
                self.settle(&item, outcome).await?;
            }
            Err(e) => {
                // An engine fault must not strand the item in `running`
                error!(item_id = item.id, error = %e, "Item processing fault");
                QueueItem::mark_failed(&self.pool, item.id, &e.to_string()).await?;
                self.mirror_task(&item, TaskStatus::Failed, Some(&e.to_string()))
                    .await;
            }
        }
        Ok(true)
    }

    /// Route the item to its backend family and normalize the result
    async fn dispatch(&self, item: &QueueItem) -> Result<DispatchOutcome> {
        match item.config_kind().map_err(EngineError::validation)? {
            ConfigKind::Service => self.dispatch_service(item).await,
            ConfigKind::Prompt => self.dispatch_prompt(item).await,
        }
    }

    async fn dispatch_service(&self, item: &QueueItem) -> Result<DispatchOutcome> {
        let config = ServiceConfiguration::find_by_id(&self.pool, item.config_id)
            .await?
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "Service configuration {} not found",
                    item.config_id
                ))
            })?;

        let kind = config.kind().map_err(EngineError::validation)?;
        let backend = backend_for(kind);
        let endpoint = config.url.clone().unwrap_or_default();

        let response: BackendResponse = backend
            .execute(&endpoint, &item.input_data, &config)
            .await;

        Ok(DispatchOutcome {
            success: response.success,
            service_name: config.name,
            response_payload: response.data,
            error: response.error,
            http_status: Some(response.status_code as i32),
            duration_ms: response.duration_ms as i64,
        })
    }

    async fn dispatch_prompt(&self, item: &QueueItem) -> Result<DispatchOutcome> {
        let template = PromptTemplate::find_by_id(&self.pool, item.config_id)
            .await?
            .ok_or_else(|| {
                EngineError::validation(format!("Prompt template {} not found", item.config_id))
            })?;

        let response = self
            .runner
            .execute_prompt(&template.code, &item.input_data, &ExecutionContext::default())
            .await?;

        let payload = response
            .data
            .clone()
            .or_else(|| (!response.content.is_empty()).then(|| json!(response.content)));

        Ok(DispatchOutcome {
            success: response.success,
            service_name: template.code,
            response_payload: payload,
            error: response.error,
            http_status: None,
            duration_ms: response.duration_ms as i64,
        })
    }

    /// Append the attempt to the audit trail. Best-effort: a lost audit row
    /// never changes item settlement.
    async fn record_audit(&self, item: &QueueItem, outcome: &DispatchOutcome) {
        let status = if outcome.success {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Error
        };
        let entry = NewExecutionAudit {
            instance_id: item.instance_id,
            task_id: item.task_id,
            config_id: item.config_id,
            service_name: outcome.service_name.clone(),
            status: status.to_string(),
            request_payload: Some(item.input_data.clone()),
            response_payload: outcome.response_payload.clone(),
            error_message: outcome.error.clone(),
            duration_ms: outcome.duration_ms,
            http_status: outcome.http_status,
            attempt: item.retry_count,
        };
        if let Err(e) = ExecutionAudit::append(&self.pool, entry).await {
            warn!(item_id = item.id, error = %e, "Audit append failed; continuing");
        }
    }

    /// Apply the settlement rules for one finished attempt
    async fn settle(&self, item: &QueueItem, outcome: DispatchOutcome) -> Result<()> {
        if outcome.success {
            QueueItem::mark_completed(&self.pool, item.id).await?;
            self.mirror_task(item, TaskStatus::Completed, None).await;
            if let Err(e) =
                ResumptionSignal::enqueue(&self.pool, item.instance_id, item.task_id).await
            {
                warn!(item_id = item.id, error = %e, "Resumption signal enqueue failed");
            }
            info!(item_id = item.id, service = %outcome.service_name, "Queue item completed");
            return Ok(());
        }

        let message = outcome
            .error
            .unwrap_or_else(|| "execution failed".to_string());
        let failure = CallFailure::new(
            message.clone(),
            outcome.http_status.map(|s| s as u16),
        );
        let class = classify(&failure);

        let exhausted = item.retry_count + 1 >= item.max_retries;
        if class == FailureClass::NonRetryable || exhausted {
            QueueItem::mark_failed(&self.pool, item.id, &message).await?;
            self.mirror_task(item, TaskStatus::Failed, Some(&message)).await;
            warn!(
                item_id = item.id,
                service = %outcome.service_name,
                retry_count = item.retry_count,
                non_retryable = (class == FailureClass::NonRetryable),
                error = %message,
                "Queue item terminally failed"
            );
        } else {
            let delay_ms = self
                .retry_config
                .backoff_delay_ms(item.retry_count, class == FailureClass::Overloaded);
            QueueItem::release_for_retry(&self.pool, item.id, &message, delay_ms).await?;
            info!(
                item_id = item.id,
                service = %outcome.service_name,
                attempt = item.retry_count + 1,
                delay_ms,
                error = %message,
                "Queue item released for retry"
            );
        }
        Ok(())
    }

    /// Mirror a terminal queue outcome onto the owning task. Best-effort:
    /// the item's own status is authoritative.
    async fn mirror_task(&self, item: &QueueItem, status: TaskStatus, error: Option<&str>) {
        if let Err(e) = Task::update_status(&self.pool, item.task_id, status, error).await {
            warn!(
                item_id = item.id,
                task_id = %item.task_id,
                error = %e,
                "Task status mirror failed"
            );
        }
    }
}

