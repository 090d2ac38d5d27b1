//! # Retry Policy and Failure Classification
//!
//! Exponential-backoff retry for model-provider calls, with a classified set
//! of non-retryable conditions: HTTP 400/401/403/404, explicit
//! authentication/permission error types, and invalid-credential messages
//! fail immediately without consuming retry budget. Provider "overloaded"
//! signals and HTTP 429 are retried with doubled backoff.
//!
//! Jitter is applied by default so concurrent retries against a degraded
//! provider spread out; disable it for deterministic fixed-doubling delays.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// A failed provider call awaiting classification
#[derive(Debug, Clone, PartialEq)]
pub struct CallFailure {
    pub message: String,
    pub status: Option<u16>,
}

impl CallFailure {
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

/// Classification outcome for a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Fail immediately; retrying cannot succeed
    NonRetryable,
    /// Retry with ordinary exponential backoff
    Retryable,
    /// Retry with doubled backoff; the provider asked for breathing room
    Overloaded,
}

/// Classify a failed call.
///
/// Status codes dominate; message phrases catch providers that report auth
/// and overload conditions in the body of a 200 or a connection error.
pub fn classify(failure: &CallFailure) -> FailureClass {
    if let Some(status) = failure.status {
        match status {
            400 | 401 | 403 | 404 => return FailureClass::NonRetryable,
            429 | 529 => return FailureClass::Overloaded,
            _ => {}
        }
    }

    let message = failure.message.to_lowercase();
    // Schema validation verdicts are deterministic; re-running the same
    // input or re-checking the same output cannot change them.
    if message.contains("validation failed") {
        return FailureClass::NonRetryable;
    }
    if message.contains("invalid api key")
        || message.contains("invalid credential")
        || message.contains("authentication")
        || message.contains("permission")
        || message.contains("unauthorized")
    {
        return FailureClass::NonRetryable;
    }
    if message.contains("overloaded") || message.contains("rate limit") {
        return FailureClass::Overloaded;
    }

    FailureClass::Retryable
}

/// Exponential backoff parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial call
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Compute the delay before retry number `attempt` (0-based).
    ///
    /// Base delay doubles per attempt; overloaded failures double again.
    /// With jitter enabled the result is scaled uniformly in [0.5, 1.5).
    pub fn delay_for(&self, attempt: u32, overloaded: bool) -> Duration {
        let exp = attempt.min(16);
        let mut delay_ms = self.base_delay.as_millis() as u64 * (1u64 << exp);
        if overloaded {
            delay_ms *= 2;
        }
        delay_ms = delay_ms.min(self.max_delay.as_millis() as u64);

        if self.jitter {
            let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
            delay_ms = ((delay_ms as f64) * factor) as u64;
        }

        Duration::from_millis(delay_ms)
    }

    /// Deterministic delay without jitter, for callers that only need the
    /// nominal schedule (and for tests)
    pub fn nominal_delay(&self, attempt: u32, overloaded: bool) -> Duration {
        let exp = attempt.min(16);
        let mut delay_ms = self.base_delay.as_millis() as u64 * (1u64 << exp);
        if overloaded {
            delay_ms *= 2;
        }
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Run `call` under the policy, classifying failures between attempts.
///
/// `call` receives the 0-based attempt number. Non-retryable failures and
/// exhausted budgets both surface the last failure.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    provider: &str,
    mut call: F,
) -> Result<T, CallFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CallFailure>>,
{
    let mut attempt = 0u32;
    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(failure) => {
                let class = classify(&failure);
                if class == FailureClass::NonRetryable {
                    debug!(
                        provider,
                        attempt,
                        error = %failure.message,
                        "Non-retryable failure; not consuming retry budget"
                    );
                    return Err(failure);
                }
                if attempt >= policy.max_retries {
                    warn!(
                        provider,
                        attempt,
                        error = %failure.message,
                        "Retry budget exhausted"
                    );
                    return Err(failure);
                }
                let delay = policy.delay_for(attempt, class == FailureClass::Overloaded);
                debug!(
                    provider,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    overloaded = (class == FailureClass::Overloaded),
                    error = %failure.message,
                    "Retrying provider call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy_no_jitter() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: false,
        }
    }

    #[test]
    fn test_auth_statuses_not_retryable() {
        for status in [400, 401, 403, 404] {
            let failure = CallFailure::new("client error", Some(status));
            assert_eq!(classify(&failure), FailureClass::NonRetryable);
        }
    }

    #[test]
    fn test_rate_limit_and_overload_retryable_with_double_backoff() {
        assert_eq!(
            classify(&CallFailure::new("too many requests", Some(429))),
            FailureClass::Overloaded
        );
        assert_eq!(
            classify(&CallFailure::new("overloaded_error", None)),
            FailureClass::Overloaded
        );
    }

    #[test]
    fn test_server_errors_retryable() {
        assert_eq!(
            classify(&CallFailure::new("internal error", Some(500))),
            FailureClass::Retryable
        );
        assert_eq!(
            classify(&CallFailure::new("connection reset by peer", None)),
            FailureClass::Retryable
        );
    }

    #[test]
    fn test_credential_message_not_retryable() {
        assert_eq!(
            classify(&CallFailure::new("Invalid API key provided", None)),
            FailureClass::NonRetryable
        );
        assert_eq!(
            classify(&CallFailure::new("permission denied for model", None)),
            FailureClass::NonRetryable
        );
    }

    #[test]
    fn test_validation_failures_not_retryable() {
        assert_eq!(
            classify(&CallFailure::new(
                "Input validation failed: \"city\" is a required property",
                None
            )),
            FailureClass::NonRetryable
        );
        assert_eq!(
            classify(&CallFailure::new(
                "Output validation failed: /total: \"ten\" is not of type \"number\"",
                None
            )),
            FailureClass::NonRetryable
        );
        // Parse failures are model nondeterminism; those stay retryable
        assert_eq!(
            classify(&CallFailure::new("Failed to parse JSON: expected value", None)),
            FailureClass::Retryable
        );
    }

    #[test]
    fn test_nominal_delay_doubles() {
        let policy = policy_no_jitter();
        assert_eq!(policy.nominal_delay(0, false), Duration::from_millis(100));
        assert_eq!(policy.nominal_delay(1, false), Duration::from_millis(200));
        assert_eq!(policy.nominal_delay(2, false), Duration::from_millis(400));
    }

    #[test]
    fn test_overloaded_delay_is_doubled() {
        let policy = policy_no_jitter();
        assert_eq!(
            policy.nominal_delay(1, true),
            policy.nominal_delay(1, false) * 2
        );
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = policy_no_jitter();
        assert_eq!(policy.nominal_delay(16, true), Duration::from_secs(10));
    }

    #[test]
    fn test_jittered_delay_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..policy_no_jitter()
        };
        for _ in 0..100 {
            let delay = policy.delay_for(2, false).as_millis() as u64;
            assert!((200..600).contains(&delay), "delay {delay} out of bounds");
        }
    }

    #[tokio::test]
    async fn test_with_retries_stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(&policy_no_jitter(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CallFailure::new("unauthorized", Some(401))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retries_exhausts_budget() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            ..policy_no_jitter()
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(&policy, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CallFailure::new("server exploded", Some(500))) }
        })
        .await;
        assert!(result.is_err());
        // Initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_succeeds_after_transient_failure() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            ..policy_no_jitter()
        };
        let calls = AtomicU32::new(0);
        let result = with_retries(&policy, "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(CallFailure::new("flaky", Some(503)))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
