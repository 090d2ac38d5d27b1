//! # Engine Error Types
//!
//! Structured error handling for the execution engine using thiserror
//! for typed error variants instead of `Box<dyn Error>` patterns.
//!
//! Business-level failures from execution backends (HTTP 4xx/5xx, timeouts,
//! malformed mocks, model parse failures) are NOT represented here — those are
//! reported as error-valued [`crate::execution::BackendResponse`] /
//! [`crate::llm::CompletionResponse`] values so that callers have a single
//! error-handling path. `EngineError` covers infrastructure faults only.

use thiserror::Error;

/// Engine-level fault taxonomy
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Credential decryption error: {message}")]
    Crypto { message: String },

    #[error("Configuration integrity violation: {message}")]
    Integrity { message: String },

    #[error("Backend execution fault: {backend}: {message}")]
    BackendExecution { backend: String, message: String },

    #[error("Model client fault: {provider}: {message}")]
    ModelClient { provider: String, message: String },

    #[error("Timeout: operation {operation} exceeded {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },
}

impl EngineError {
    /// Create a database error tagged with the failing operation
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error tagged with the offending component
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration-integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Create a credential decryption error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a model client fault
    pub fn model_client(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelClient {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            operation: "query".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = EngineError::database("claim_next", "connection refused");
        assert_eq!(
            err.to_string(),
            "Database error: claim_next: connection refused"
        );
    }

    #[test]
    fn test_sqlx_conversion() {
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, EngineError::Database { .. }));
    }

    #[test]
    fn test_integrity_error_display() {
        let err = EngineError::integrity("two active defaults for provider openai");
        assert!(err.to_string().contains("integrity"));
    }
}
