//! HTTP and GraphQL transport.
//!
//! Two transports share one response classifier:
//!
//! ```text
//!  BlockingTransport (reqwest::blocking)   AsyncTransport (reqwest + tokio)
//!                 │                                  │
//!                 └──────────────┬───────────────────┘
//!                                ↓
//!        ensure fresh token → build headers → send → classify
//!                                                     │
//!                 401 → Auth   ≥400 → FlowNotFound / RunNotFound / Api
//!                 2xx → unwrap `body` envelope (REST) or `data` (GraphQL)
//! ```

pub mod async_transport;
pub mod blocking;

pub use async_transport::AsyncTransport;
pub use blocking::BlockingTransport;

use crate::error::{FastnError, Result};
use crate::headers::redact_headers;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

pub const GRAPHQL_PATH: &str = "/graphql";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response bodies are cut to this many characters in verbose logs.
const LOG_BODY_LIMIT: usize = 500;

/// Transport tuning shared by both transports.
#[derive(Clone, Debug)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub verbose: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
        }
    }
}

/// GraphQL request envelope.
#[derive(Debug, Serialize)]
pub struct GraphQLRequest<'a> {
    pub query: &'a str,
    pub variables: Value,
}

/// Classify a REST response.
///
/// # Returns
/// * `Ok(value)` - Parsed body, or the `body` field when the envelope has one
/// * `Err(Auth)` - HTTP 401
/// * `Err(FlowNotFound | RunNotFound)` - Known error codes on a 4xx/5xx
/// * `Err(Api)` - Any other failure, with status and raw body
pub fn classify_response(status: u16, body: &str) -> Result<Value> {
    if status >= 400 {
        return Err(classify_error(status, body));
    }

    let value = parse_success(status, body)?;
    match value {
        Value::Object(mut map) if map.contains_key("body") => {
            Ok(map.remove("body").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// Classify a GraphQL response. A non-empty `errors` array fails the call even
/// on HTTP 200; otherwise the `data` field is returned.
pub fn classify_graphql(status: u16, body: &str) -> Result<Value> {
    if status >= 400 {
        return Err(classify_error(status, body));
    }

    let mut value = parse_success(status, body)?;
    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown GraphQL error")
                .to_string();
            return Err(FastnError::Api {
                message,
                status: Some(status),
                body: Some(body.to_string()),
            });
        }
    }

    Ok(value
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

fn parse_success(status: u16, body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| FastnError::Api {
        message: format!("invalid JSON in response: {}", e),
        status: Some(status),
        body: Some(body.to_string()),
    })
}

fn classify_error(status: u16, body: &str) -> FastnError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status == 401 {
        return FastnError::auth(message);
    }

    let code = parsed.as_ref().and_then(error_code).map(normalize_code);
    match code.as_deref() {
        Some("FLOW_NOT_FOUND") => FastnError::FlowNotFound {
            message,
            body: Some(body.to_string()),
        },
        Some("RUN_NOT_FOUND") => FastnError::RunNotFound {
            message,
            body: Some(body.to_string()),
        },
        _ => FastnError::Api {
            message: format!("HTTP {}: {}", status, message),
            status: Some(status),
            body: Some(body.to_string()),
        },
    }
}

/// Structured error code from `code`, `errorCode` or `error.code`.
fn error_code(body: &Value) -> Option<&str> {
    body.get("code")
        .or_else(|| body.get("errorCode"))
        .or_else(|| body.get("error").and_then(|e| e.get("code")))
        .and_then(Value::as_str)
}

fn error_message(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.get("error").and_then(|e| e.get("message")))
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// "flow not found", "flow-not-found" and "FLOW_NOT_FOUND" compare equal.
fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

pub(crate) fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}... ({} chars total)", cut, text.chars().count())
}

pub(crate) fn log_request(method: &str, url: &str, headers: &HeaderMap, payload: Option<&Value>) {
    let headers = redact_headers(headers);
    info!(
        target: "fastn::transport",
        method = method,
        url = url,
        headers = ?headers,
        payload = %payload.map(|p| p.to_string()).unwrap_or_default(),
        "Sending request"
    );
}

pub(crate) fn log_response(url: &str, status: u16, body: &str) {
    info!(
        target: "fastn::transport",
        url = url,
        status = status,
        body = %truncate(body, LOG_BODY_LIMIT),
        "Received response"
    );
}
