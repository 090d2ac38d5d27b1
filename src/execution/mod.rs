//! # Execution Backends
//!
//! Pluggable implementations of the service-call contract. The queue worker
//! resolves a [`ServiceConfiguration`](crate::models::ServiceConfiguration),
//! asks [`backend_for`] for the matching backend, and consumes the
//! normalized [`BackendResponse`] regardless of kind.

pub mod backend;
pub mod http_backend;
pub mod mock_backend;
pub mod response;

pub use backend::{backend_for, ExecutionBackend};
pub use http_backend::HttpBackend;
pub use mock_backend::{
    select_scenario, template_definition, MockBackend, MockDefinition, MockScenario,
};
pub use response::BackendResponse;
