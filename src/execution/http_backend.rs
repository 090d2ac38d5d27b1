//! # HTTP Execution Backend
//!
//! Performs real outbound calls. GET requests carry the input as query
//! parameters; every other method sends it as a JSON body. The primary auth
//! header comes from the configuration's [`AuthDescriptor`]; extra headers
//! are merged in regardless of scheme. A hard per-call deadline is enforced
//! with `tokio::time::timeout` — a hung upstream yields a 408 error
//! response, never a blocked worker.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::backend::ExecutionBackend;
use super::response::BackendResponse;
use crate::models::{AuthDescriptor, ServiceConfiguration};

/// HTTP execution backend
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Build headers from the auth descriptor plus merged extras.
    ///
    /// Header construction failures (non-ASCII values and the like) are
    /// config errors surfaced as strings so `execute` can report them as an
    /// error response rather than a fault.
    pub fn build_headers(
        auth: &AuthDescriptor,
        extra: &std::collections::HashMap<String, String>,
    ) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();

        match auth {
            AuthDescriptor::None => {}
            AuthDescriptor::ApiKey { key } => {
                headers.insert(
                    HeaderName::from_static("x-api-key"),
                    HeaderValue::from_str(key).map_err(|e| format!("invalid api key: {e}"))?,
                );
            }
            AuthDescriptor::Bearer { token } => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {token}"))
                        .map_err(|e| format!("invalid bearer token: {e}"))?,
                );
            }
            AuthDescriptor::Basic { username, password } => {
                let encoded = BASE64.encode(format!("{username}:{password}"));
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {encoded}"))
                        .map_err(|e| format!("invalid basic credentials: {e}"))?,
                );
            }
            AuthDescriptor::CustomHeader { name, value } => {
                let header_name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| format!("invalid custom header name '{name}': {e}"))?;
                headers.insert(
                    header_name,
                    HeaderValue::from_str(value)
                        .map_err(|e| format!("invalid custom header value: {e}"))?,
                );
            }
        }

        for (name, value) in extra {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| format!("invalid extra header name '{name}': {e}"))?;
            headers.insert(
                header_name,
                HeaderValue::from_str(value)
                    .map_err(|e| format!("invalid extra header value: {e}"))?,
            );
        }

        Ok(headers)
    }

    /// Flatten a JSON object into query pairs for GET requests.
    /// Non-string scalars are rendered with their JSON form.
    pub fn query_pairs(input: &Value) -> Vec<(String, String)> {
        match input {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let rendered = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), rendered)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Parse a response body: JSON when the content-type says so, otherwise
    /// wrap the raw text in a single-field document.
    fn parse_body(content_type: Option<&str>, body: String) -> Value {
        let is_json = content_type
            .map(|ct| ct.contains("application/json") || ct.contains("+json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(&body).unwrap_or(json!({ "raw": body }))
        } else {
            json!({ "raw": body })
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(
        &self,
        endpoint: &str,
        input: &Value,
        config: &ServiceConfiguration,
    ) -> BackendResponse {
        let started = Instant::now();
        let timeout_seconds = config.timeout_seconds.max(1) as u64;

        let method = match config.http_method.to_uppercase().parse::<Method>() {
            Ok(m) => m,
            Err(_) => {
                return BackendResponse::error(
                    format!("invalid HTTP method '{}'", config.http_method),
                    500,
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let auth = match config.auth_descriptor() {
            Ok(auth) => auth,
            Err(e) => {
                return BackendResponse::error(
                    format!("malformed auth descriptor: {e}"),
                    500,
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let headers = match Self::build_headers(&auth, &config.extra_header_map()) {
            Ok(h) => h,
            Err(e) => {
                return BackendResponse::error(e, 500, started.elapsed().as_millis() as u64);
            }
        };

        let mut request = self.client.request(method.clone(), endpoint).headers(headers);
        if method == Method::GET {
            request = request.query(&Self::query_pairs(input));
        } else {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .json(input);
        }

        debug!(
            service = %config.name,
            method = %method,
            endpoint,
            timeout_seconds,
            "Dispatching HTTP backend call"
        );

        let result = tokio::time::timeout(
            Duration::from_secs(timeout_seconds),
            request.send(),
        )
        .await;

        let elapsed = started.elapsed().as_millis() as u64;

        let response = match result {
            Err(_) => {
                warn!(
                    service = %config.name,
                    timeout_seconds,
                    "HTTP backend call timed out"
                );
                return BackendResponse::error(
                    format!("request timed out after {timeout_seconds}s"),
                    408,
                    elapsed,
                );
            }
            Ok(Err(e)) => {
                return BackendResponse::error(
                    format!("request failed: {e}"),
                    e.status().map(|s| s.as_u16()).unwrap_or(502),
                    elapsed,
                );
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.unwrap_or_default();
        let parsed = Self::parse_body(content_type.as_deref(), body);
        let elapsed = started.elapsed().as_millis() as u64;

        if status.is_success() {
            BackendResponse::success(parsed, status.as_u16(), elapsed)
        } else {
            BackendResponse::error(
                format!("upstream returned HTTP {}", status.as_u16()),
                status.as_u16(),
                elapsed,
            )
            .with_data(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_api_key_header() {
        let headers = HttpBackend::build_headers(
            &AuthDescriptor::ApiKey {
                key: "k-123".to_string(),
            },
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "k-123");
    }

    #[test]
    fn test_bearer_header() {
        let headers = HttpBackend::build_headers(
            &AuthDescriptor::Bearer {
                token: "tok".to_string(),
            },
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[test]
    fn test_basic_header_encodes_credentials() {
        let headers = HttpBackend::build_headers(
            &AuthDescriptor::Basic {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
            &HashMap::new(),
        )
        .unwrap();
        let value = headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert_eq!(value, format!("Basic {}", BASE64.encode("user:pass")));
    }

    #[test]
    fn test_extra_headers_merged_regardless_of_scheme() {
        let mut extra = HashMap::new();
        extra.insert("x-trace-id".to_string(), "trace-9".to_string());
        let headers = HttpBackend::build_headers(
            &AuthDescriptor::Bearer {
                token: "tok".to_string(),
            },
            &extra,
        )
        .unwrap();
        assert_eq!(headers.get("x-trace-id").unwrap(), "trace-9");
        assert!(headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_custom_header_scheme() {
        let headers = HttpBackend::build_headers(
            &AuthDescriptor::CustomHeader {
                name: "x-internal-token".to_string(),
                value: "v".to_string(),
            },
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(headers.get("x-internal-token").unwrap(), "v");
    }

    #[test]
    fn test_query_pairs_renders_scalars() {
        let input = serde_json::json!({"city": "Berlin", "days": 3, "metric": true});
        let mut pairs = HttpBackend::query_pairs(&input);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("city".to_string(), "Berlin".to_string()),
                ("days".to_string(), "3".to_string()),
                ("metric".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_body_json_content_type() {
        let parsed =
            HttpBackend::parse_body(Some("application/json"), r#"{"ok": true}"#.to_string());
        assert_eq!(parsed["ok"], true);
    }

    #[test]
    fn test_parse_body_text_wrapped() {
        let parsed = HttpBackend::parse_body(Some("text/plain"), "hello".to_string());
        assert_eq!(parsed["raw"], "hello");
    }

    #[test]
    fn test_parse_body_invalid_json_wrapped() {
        let parsed = HttpBackend::parse_body(Some("application/json"), "not json".to_string());
        assert_eq!(parsed["raw"], "not json");
    }
}
