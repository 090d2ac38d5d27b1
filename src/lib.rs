//! # Dispatch Core
//!
//! Asynchronous task execution engine: a durable Postgres-backed queue of
//! deferred work items, a polling worker that claims and executes them, and
//! two backend families — configured service calls (real HTTP or simulated
//! mocks) and AI prompt executions against pluggable model providers.
//!
//! ## Architecture
//!
//! ```text
//!   enqueue                    claim (FOR UPDATE SKIP LOCKED)
//!   ───────►  execution_queue  ───────────────────────────►  QueueWorker
//!                                                               │
//!                                      ┌────────────────────────┴──────┐
//!                                      ▼                               ▼
//!                              ExecutionBackend                  PromptRunner
//!                              (http / mock)                (render, validate,
//!                                      │                     model client call)
//!                                      ▼                               ▼
//!                              execution_audits              prompt_executions
//! ```
//!
//! ## Key Components
//!
//! - [`models::QueueItem`]: the durable unit of deferred work, claimed
//!   atomically so concurrent workers never double-execute an item
//! - [`worker::QueueWorker`]: the polling loop with retry backoff, stale-item
//!   recovery, task-status mirroring, and resumption signalling
//! - [`execution`]: pluggable service backends behind one trait
//! - [`llm`]: one client per AI provider behind [`llm::ModelClient`], with
//!   retry classification and JSON extraction
//! - [`prompt`]: template rendering and schema-gated prompt execution
//!
//! ## Failure Philosophy
//!
//! Infrastructure faults (datastore down, unresolvable configuration) travel
//! as [`error::EngineError`]. Business failures (HTTP 4xx/5xx, provider
//! errors, validation and parse failures) travel as error-valued response
//! structs, so every caller has exactly one error-handling path per concern.

pub mod config;
pub mod constants;
pub mod crypto;
pub mod database;
pub mod error;
pub mod execution;
pub mod llm;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod worker;

pub use config::EngineConfig;
pub use constants::{ExecutionStatus, QueueItemStatus, TaskStatus};
pub use error::{EngineError, Result};
pub use execution::{backend_for, BackendResponse, ExecutionBackend};
pub use llm::{
    CompletionResponse, Complexity, ModelClient, ModelClientFactory, ModelOptions, Provider,
};
pub use models::{ConfigKind, NewQueueItem, QueueItem};
pub use prompt::{ExecutionContext, PromptRunner};
pub use worker::QueueWorker;
