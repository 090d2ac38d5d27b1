//! # Mock Execution Backend
//!
//! Simulates a third-party call from a named template or an inline
//! definition, with weighted-random error injection and artificial latency.
//! Used for demos, load tests, and workflow development without real
//! upstream dependencies.
//!
//! ## Scenario Selection
//!
//! Scenarios are evaluated in declaration order, accumulating probability
//! mass; the first scenario whose cumulative threshold exceeds a uniform
//! draw in [0,1) fires. A scenario list summing to zero never fires, and a
//! scenario with probability 1.0 always does. Outcomes are intentionally
//! non-deterministic — tests assert on reachable outcome sets, not exact
//! sequences.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::backend::ExecutionBackend;
use super::response::BackendResponse;
use crate::models::ServiceConfiguration;

/// Simulated success latency bounds in milliseconds
const MIN_LATENCY_MS: u64 = 100;
const MAX_LATENCY_MS: u64 = 500;

/// One injectable error scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockScenario {
    pub name: String,
    /// Probability mass in [0,1]; accumulated in declaration order
    pub probability: f64,
    /// Artificial delay before returning, used to simulate timeouts
    #[serde(default)]
    pub delay_ms: Option<u64>,
    pub status_code: u16,
    pub error: String,
    #[serde(default)]
    pub body: Option<Value>,
}

/// Mock service definition: a success payload plus error scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockDefinition {
    pub success_data: Value,
    #[serde(default)]
    pub scenarios: Vec<MockScenario>,
}

/// Built-in template registry, keyed by exact template code
static TEMPLATE_REGISTRY: Lazy<HashMap<&'static str, MockDefinition>> = Lazy::new(|| {
    let mut registry = HashMap::new();

    registry.insert(
        "weather_service_mock",
        MockDefinition {
            success_data: json!({
                "temperature": 72,
                "conditions": "partly cloudy",
                "humidity": 48,
                "wind_mph": 7
            }),
            scenarios: vec![
                MockScenario {
                    name: "rate_limited".to_string(),
                    probability: 0.05,
                    delay_ms: None,
                    status_code: 429,
                    error: "rate limit exceeded".to_string(),
                    body: None,
                },
                MockScenario {
                    name: "upstream_timeout".to_string(),
                    probability: 0.05,
                    delay_ms: Some(2_000),
                    status_code: 504,
                    error: "upstream timed out".to_string(),
                    body: None,
                },
            ],
        },
    );

    registry.insert(
        "payment_gateway_mock",
        MockDefinition {
            success_data: json!({
                "transaction_id": "txn_mock_0001",
                "approved": true
            }),
            scenarios: vec![MockScenario {
                name: "card_declined".to_string(),
                probability: 0.1,
                delay_ms: None,
                status_code: 402,
                error: "card declined".to_string(),
                body: Some(json!({"decline_code": "insufficient_funds"})),
            }],
        },
    );

    registry.insert(
        "crm_lookup_mock",
        MockDefinition {
            success_data: json!({
                "account_id": "acct_mock_42",
                "tier": "enterprise"
            }),
            scenarios: vec![],
        },
    );

    registry
});

/// Look up a built-in mock template by exact code
pub fn template_definition(code: &str) -> Option<MockDefinition> {
    TEMPLATE_REGISTRY.get(code).cloned()
}

/// Pure scenario selection against a pre-drawn uniform roll.
///
/// Split out from [`MockBackend::execute`] so the accumulation algorithm is
/// testable without randomness.
pub fn select_scenario(scenarios: &[MockScenario], roll: f64) -> Option<&MockScenario> {
    let mut cumulative = 0.0;
    for scenario in scenarios {
        cumulative += scenario.probability;
        if roll < cumulative {
            return Some(scenario);
        }
    }
    None
}

/// Mock execution backend
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the effective definition: inline wins over named template
    fn resolve_definition(&self, config: &ServiceConfiguration) -> Option<MockDefinition> {
        if let Some(inline) = &config.mock_definition {
            match serde_json::from_value::<MockDefinition>(inline.clone()) {
                Ok(definition) => return Some(definition),
                Err(e) => {
                    warn!(
                        config = %config.name,
                        error = %e,
                        "Inline mock definition is malformed"
                    );
                    return None;
                }
            }
        }
        config
            .mock_template
            .as_deref()
            .and_then(template_definition)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        _endpoint: &str,
        _input: &Value,
        config: &ServiceConfiguration,
    ) -> BackendResponse {
        let started = Instant::now();

        let Some(definition) = self.resolve_definition(config) else {
            return BackendResponse::error(
                format!(
                    "no mock definition resolved for configuration '{}'",
                    config.name
                ),
                500,
                started.elapsed().as_millis() as u64,
            );
        };

        let roll: f64 = rand::thread_rng().gen_range(0.0..1.0);

        if let Some(scenario) = select_scenario(&definition.scenarios, roll) {
            let scenario = scenario.clone();
            debug!(
                config = %config.name,
                scenario = %scenario.name,
                roll,
                "Mock scenario triggered"
            );
            if let Some(delay_ms) = scenario.delay_ms {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            let mut response = BackendResponse::error(
                scenario.error,
                scenario.status_code,
                started.elapsed().as_millis() as u64,
            );
            if let Some(body) = scenario.body {
                response = response.with_data(body);
            }
            return response;
        }

        let latency = rand::thread_rng().gen_range(MIN_LATENCY_MS..=MAX_LATENCY_MS);
        tokio::time::sleep(Duration::from_millis(latency)).await;

        BackendResponse::success(
            definition.success_data,
            200,
            started.elapsed().as_millis() as u64,
        )
    }
}
