//! # Execution Backend Contract
//!
//! The uniform interface every service backend implements. Backends are
//! stateless and safe to invoke concurrently from multiple workers; they
//! never return `Err` for business failures (HTTP 4xx/5xx, timeouts,
//! malformed mocks) — those come back as error-valued
//! [`BackendResponse`] values.

use async_trait::async_trait;
use serde_json::Value;

use super::http_backend::HttpBackend;
use super::mock_backend::MockBackend;
use super::response::BackendResponse;
use crate::models::{ServiceConfiguration, ServiceKind};

/// Uniform service-call contract
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Backend name for logging and audit rows
    fn name(&self) -> &str;

    /// Execute one call against `endpoint` with `input`.
    ///
    /// Infallible at the type level: all failure modes are reported inside
    /// the response. Only programmer errors may panic.
    async fn execute(
        &self,
        endpoint: &str,
        input: &Value,
        config: &ServiceConfiguration,
    ) -> BackendResponse;
}

/// Construct the backend matching a configuration's kind.
///
/// Exhaustive over [`ServiceKind`]; adding a kind without extending this
/// factory is a compile error.
pub fn backend_for(kind: ServiceKind) -> Box<dyn ExecutionBackend> {
    match kind {
        ServiceKind::Real => Box::new(HttpBackend::new()),
        ServiceKind::Mock => Box::new(MockBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_returns_matching_backend() {
        assert_eq!(backend_for(ServiceKind::Real).name(), "http");
        assert_eq!(backend_for(ServiceKind::Mock).name(), "mock");
    }
}
