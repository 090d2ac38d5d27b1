//! # Prompt Library
//!
//! Template-driven AI prompt execution: named templates with `{{variable}}`
//! placeholders, JSON Schema gates on input and output, and an append-only
//! audit trail of every model invocation.
//!
//! The entry point is [`PromptRunner::execute_prompt`], used both directly
//! and by the queue worker for deferred prompt items.

pub mod executor;
pub mod renderer;
pub mod schema;

pub use executor::{ExecutionContext, PromptRunner};
pub use renderer::render_template;
