//! # Normalized Backend Response
//!
//! Every backend kind — mock, HTTP, and (via adaptation) AI clients —
//! produces this shape, so the queue worker has exactly one result-handling
//! path. Business failures are error-valued responses, never `Err`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized result of one backend call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub success: bool,
    /// Structured payload on success (or the error body when the upstream
    /// returned one)
    pub data: Option<Value>,
    pub error: Option<String>,
    /// HTTP-like status code; mocks and timeouts synthesize one
    pub status_code: u16,
    pub duration_ms: u64,
}

impl BackendResponse {
    /// Create a successful response
    pub fn success(data: Value, status_code: u16, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code,
            duration_ms,
        }
    }

    /// Create an error response
    pub fn error(error: impl Into<String>, status_code: u16, duration_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status_code,
            duration_ms,
        }
    }

    /// Attach the upstream error body to an error response
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_response() {
        let resp = BackendResponse::success(json!({"temperature": 72}), 200, 150);
        assert!(resp.success);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.data.unwrap()["temperature"], 72);
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_error_response_with_body() {
        let resp = BackendResponse::error("upstream rejected request", 422, 30)
            .with_data(json!({"field": "city"}));
        assert!(!resp.success);
        assert_eq!(resp.status_code, 422);
        assert!(resp.data.is_some());
    }
}
