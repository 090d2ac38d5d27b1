//! HTTP backend behavior against throwaway local servers: canned responses,
//! auth header propagation, status preservation, and the hard timeout.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use dispatch_core::execution::{ExecutionBackend, HttpBackend};
use dispatch_core::models::{AuthDescriptor, ServiceConfiguration, ServiceKind};

fn real_config(
    url: &str,
    method: &str,
    timeout_seconds: i32,
    auth: AuthDescriptor,
) -> ServiceConfiguration {
    ServiceConfiguration {
        id: Uuid::new_v4(),
        name: "test-http".to_string(),
        kind: ServiceKind::Real.to_string(),
        url: Some(url.to_string()),
        http_method: method.to_string(),
        timeout_seconds,
        max_retries: 3,
        auth: serde_json::to_value(&auth).unwrap(),
        extra_headers: None,
        mock_template: None,
        mock_definition: None,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Serve exactly one canned HTTP response, returning the raw request text
async fn one_shot_server(status_line: &str, content_type: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        // Read until the full request (headers plus declared body) arrives
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text
                    .lines()
                    .find_map(|l| l.to_lowercase().strip_prefix("content-length:").map(str::trim).map(str::to_owned))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&raw).into_owned()
    });
    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn json_success_body_is_parsed() {
    let (url, request) =
        one_shot_server("200 OK", "application/json", r#"{"result": "fine"}"#).await;
    let config = real_config(&url, "POST", 5, AuthDescriptor::None);

    let response = HttpBackend::new()
        .execute(&url, &json!({"q": 1}), &config)
        .await;

    assert!(response.success);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.data.unwrap()["result"], "fine");

    let raw = request.await.unwrap();
    assert!(raw.starts_with("POST"));
    assert!(raw.contains(r#"{"q":1}"#), "body missing from request: {raw}");
}

#[tokio::test]
async fn get_requests_carry_input_as_query_params() {
    let (url, request) = one_shot_server("200 OK", "application/json", "{}").await;
    let config = real_config(&url, "GET", 5, AuthDescriptor::None);

    let response = HttpBackend::new()
        .execute(&url, &json!({"city": "Berlin", "days": 3}), &config)
        .await;
    assert!(response.success);

    let raw = request.await.unwrap();
    let request_line = raw.lines().next().unwrap();
    assert!(request_line.starts_with("GET"));
    assert!(request_line.contains("city=Berlin"));
    assert!(request_line.contains("days=3"));
}

#[tokio::test]
async fn bearer_auth_header_is_sent() {
    let (url, request) = one_shot_server("200 OK", "application/json", "{}").await;
    let config = real_config(
        &url,
        "POST",
        5,
        AuthDescriptor::Bearer {
            token: "tok-77".to_string(),
        },
    );

    HttpBackend::new().execute(&url, &json!({}), &config).await;

    let raw = request.await.unwrap().to_lowercase();
    assert!(raw.contains("authorization: bearer tok-77"), "missing auth: {raw}");
}

#[tokio::test]
async fn non_2xx_status_and_body_are_preserved() {
    let (url, _request) = one_shot_server(
        "422 Unprocessable Entity",
        "application/json",
        r#"{"detail": "bad input"}"#,
    )
    .await;
    let config = real_config(&url, "POST", 5, AuthDescriptor::None);

    let response = HttpBackend::new().execute(&url, &json!({}), &config).await;

    assert!(!response.success);
    assert_eq!(response.status_code, 422);
    assert!(response.error.unwrap().contains("422"));
    assert_eq!(response.data.unwrap()["detail"], "bad input");
}

#[tokio::test]
async fn text_body_is_wrapped_in_raw_field() {
    let (url, _request) = one_shot_server("200 OK", "text/plain", "pong").await;
    let config = real_config(&url, "GET", 5, AuthDescriptor::None);

    let response = HttpBackend::new().execute(&url, &json!({}), &config).await;
    assert!(response.success);
    assert_eq!(response.data.unwrap()["raw"], "pong");
}

#[tokio::test]
async fn hung_upstream_yields_408_within_deadline() {
    // Accept the connection, then never respond
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(socket);
    });

    let url = format!("http://{addr}");
    let config = real_config(&url, "POST", 1, AuthDescriptor::None);

    let started = std::time::Instant::now();
    let response = HttpBackend::new().execute(&url, &json!({}), &config).await;

    assert!(!response.success);
    assert_eq!(response.status_code, 408);
    assert!(response.error.unwrap().contains("timed out"));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    hold.abort();
}

#[tokio::test]
async fn unreachable_host_is_an_error_response() {
    // Port 1 on localhost refuses connections
    let url = "http://127.0.0.1:1";
    let config = real_config(url, "POST", 2, AuthDescriptor::None);

    let response = HttpBackend::new().execute(url, &json!({}), &config).await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("request failed"));
}

#[tokio::test]
async fn invalid_method_is_an_error_response() {
    let config = real_config("http://127.0.0.1:1", "FR OBNICATE", 2, AuthDescriptor::None);
    let response = HttpBackend::new()
        .execute("http://127.0.0.1:1", &json!({}), &config)
        .await;
    assert!(!response.success);
    assert_eq!(response.status_code, 500);
    assert!(response.error.unwrap().contains("invalid HTTP method"));
}

#[tokio::test]
async fn extra_headers_reach_the_wire() {
    let (url, request) = one_shot_server("200 OK", "application/json", "{}").await;
    let mut config = real_config(&url, "POST", 5, AuthDescriptor::None);
    let mut extra = HashMap::new();
    extra.insert("x-trace-id".to_string(), "trace-12".to_string());
    config.extra_headers = Some(serde_json::to_value(extra).unwrap());

    HttpBackend::new()
        .execute(&url, &Value::Object(Default::default()), &config)
        .await;

    let raw = request.await.unwrap().to_lowercase();
    assert!(raw.contains("x-trace-id: trace-12"), "missing header: {raw}");
}
