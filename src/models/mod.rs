//! # Data Layer
//!
//! sqlx-backed models for the execution engine. Each model owns its table's
//! queries; status columns are stored as lowercase text and round-trip
//! through the enums in [`crate::constants`]. All queries use the
//! runtime-checked `query_as` form so the crate builds without a live
//! database.

pub mod execution_audit;
pub mod model_interface;
pub mod prompt_execution;
pub mod prompt_template;
pub mod queue_item;
pub mod resumption_signal;
pub mod service_configuration;
pub mod task;

pub use execution_audit::{ExecutionAudit, NewExecutionAudit};
pub use model_interface::{ModelInterface, NewModelInterface};
pub use prompt_execution::{PromptExecution, PromptExecutionOutcome};
pub use prompt_template::{NewPromptTemplate, OutputFormat, PromptTemplate};
pub use queue_item::{ConfigKind, NewQueueItem, QueueItem, QueueStats};
pub use resumption_signal::ResumptionSignal;
pub use service_configuration::{
    AuthDescriptor, NewServiceConfiguration, ServiceConfiguration, ServiceKind,
};
pub use task::Task;
