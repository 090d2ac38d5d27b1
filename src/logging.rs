//! # Structured Logging Module
//!
//! Environment-aware tracing initialization for worker processes. Console
//! output is env-filtered; production (or `DISPATCH_LOG_FORMAT=json`) emits
//! newline-delimited JSON for log shipping.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// If a global subscriber is already set (e.g. by an embedding application),
/// initialization is a no-op rather than a panic.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level));

        let format_var = std::env::var("DISPATCH_LOG_FORMAT").ok();
        let layer = if json_output_enabled(format_var.as_deref(), &environment) {
            fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(environment = %environment, "Structured logging initialized");
    });
}

/// JSON output applies in production, or anywhere via
/// `DISPATCH_LOG_FORMAT=json`. An explicit `DISPATCH_LOG_FORMAT` other than
/// `json` forces plain console output even in production.
fn json_output_enabled(format_var: Option<&str>, environment: &str) -> bool {
    match format_var {
        Some(format) => format.eq_ignore_ascii_case("json"),
        None => environment == "production",
    }
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("DISPATCH_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get default log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_json_output_selection() {
        assert!(json_output_enabled(None, "production"));
        assert!(!json_output_enabled(None, "development"));
        assert!(json_output_enabled(Some("json"), "development"));
        assert!(json_output_enabled(Some("JSON"), "development"));
        // Explicit non-json format wins over the production default
        assert!(!json_output_enabled(Some("pretty"), "production"));
    }
}
