//! Shared HTTP client, SSE parsing, and error classification.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{ErrorCode, ErrorDetails, RelayError};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout: streams are bounded by the caller's token timeouts.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data lines.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Split the next complete line off `buffer`, without its terminator.
///
/// Works on bytes so a UTF-8 character split across network chunks is only
/// decoded once the whole line has arrived.
pub fn take_sse_line(buffer: &mut Vec<u8>) -> Option<Result<String, std::str::Utf8Error>> {
    let end = buffer.iter().position(|&b| b == b'\n')?;
    let raw: Vec<u8> = buffer.drain(..=end).collect();
    Some(std::str::from_utf8(&raw).map(|line| line.trim().to_string()))
}

/// Whether an SSE line is the end-of-stream marker.
pub fn is_sse_done(line: &str) -> bool {
    line.strip_prefix("data:").map(str::trim) == Some("[DONE]")
}

/// Build an API error from a status code and response body.
///
/// The structured body (`{"error": {"type", "code", "message", "param"}}`)
/// decides the error code when present; otherwise the status does.
pub fn status_to_error(status: u16, body: &str) -> RelayError {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let message = error
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    let provider_code = error.and_then(|e| {
        e.get("code")
            .and_then(|c| c.as_str())
            .or_else(|| e.get("type").and_then(|t| t.as_str()))
            .map(str::to_string)
    });
    let param = error
        .and_then(|e| e.get("param"))
        .and_then(|p| p.as_str())
        .map(str::to_string);

    let code = classify(status, error, &message);
    RelayError::api_with_details(
        status,
        message,
        ErrorDetails {
            code: Some(code),
            provider_code,
            param,
            non_retriable: false,
        },
    )
}

/// Classify an error event that arrives inside an otherwise successful stream.
pub fn stream_error(value: &serde_json::Value) -> RelayError {
    let status = value
        .get("status")
        .or_else(|| value.get("code"))
        .and_then(|s| s.as_u64())
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(500);
    let body = serde_json::json!({ "error": value }).to_string();
    status_to_error(status, &body)
}

fn classify(status: u16, error: Option<&serde_json::Value>, message: &str) -> ErrorCode {
    let field = |name: &str| {
        error
            .and_then(|e| e.get(name))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    };
    let kind = field("type");
    let code = field("code");
    let tagged = |needle: &str| kind.contains(needle) || code.contains(needle);

    if tagged("context_length") {
        return ErrorCode::ContextLengthExceeded;
    }
    if tagged("unsupported") {
        return ErrorCode::UnsupportedParams;
    }
    // LiteLLM-style proxies report tool call translation failures as plain errors.
    if message.contains("Unable to convert openai tool calls") {
        return ErrorCode::ToolCallConversion;
    }
    if tagged("invalid_api_key") || tagged("authentication") {
        return ErrorCode::InvalidApiKey;
    }
    if tagged("model_not_found") {
        return ErrorCode::ModelNotFound;
    }
    if tagged("rate_limit") || tagged("insufficient_quota") {
        return ErrorCode::RateLimitExceeded;
    }
    if tagged("badrequest") || tagged("bad_request") || tagged("invalid_request") {
        return ErrorCode::BadRequest;
    }
    match status {
        400 | 422 => ErrorCode::BadRequest,
        401 | 403 => ErrorCode::InvalidApiKey,
        404 => ErrorCode::ModelNotFound,
        408 | 504 => ErrorCode::Timeout,
        429 => ErrorCode::RateLimitExceeded,
        503 => ErrorCode::ServiceUnavailable,
        500..=599 => ErrorCode::ServerError,
        _ => ErrorCode::Unknown,
    }
}
