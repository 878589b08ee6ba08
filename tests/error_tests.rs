//! Tests for error classification and retriability.

use relay::error::*;
use relay::provider::http::status_to_error;

#[test]
fn error_api_creation() {
    let err = RelayError::api(404, "Not found");
    assert!(matches!(&err, RelayError::Api { status: 404, .. }));
    assert_eq!(err.to_string(), "API error (status 404): Not found");
}

#[test]
fn categories_and_retriability_are_stable_for_major_variants() {
    struct Case {
        error: RelayError,
        expected_category: ErrorCategory,
        expected_retryable: bool,
    }

    let network_error = reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err();
    let serde_error = serde_json::from_str::<serde_json::Value>("{not-json}").unwrap_err();

    let cases = vec![
        Case {
            error: RelayError::Timeout(60_000),
            expected_category: ErrorCategory::Timeout,
            expected_retryable: true,
        },
        Case {
            error: RelayError::EmptyResponse,
            expected_category: ErrorCategory::EmptyResponse,
            expected_retryable: true,
        },
        Case {
            error: RelayError::MissingToolCalls { attempts: 8 },
            expected_category: ErrorCategory::MissingToolCalls,
            expected_retryable: false,
        },
        Case {
            error: RelayError::InvalidToolCalls("Invalid JSON response".into()),
            expected_category: ErrorCategory::Emulation,
            expected_retryable: true,
        },
        Case {
            error: RelayError::Interrupted,
            expected_category: ErrorCategory::Interrupted,
            expected_retryable: false,
        },
        Case {
            error: RelayError::Configuration("no key".into()),
            expected_category: ErrorCategory::Configuration,
            expected_retryable: false,
        },
        Case {
            error: RelayError::Network(network_error),
            expected_category: ErrorCategory::Network,
            expected_retryable: true,
        },
        Case {
            error: RelayError::Serialization(serde_error),
            expected_category: ErrorCategory::Serialization,
            expected_retryable: true,
        },
        Case {
            error: RelayError::api(429, "slow down"),
            expected_category: ErrorCategory::RateLimit,
            expected_retryable: true,
        },
        Case {
            error: RelayError::api(401, "who are you"),
            expected_category: ErrorCategory::Authentication,
            expected_retryable: false,
        },
    ];

    for case in cases {
        assert_eq!(case.error.category(), case.expected_category, "{}", case.error);
        assert_eq!(case.error.is_retryable(), case.expected_retryable, "{}", case.error);
    }
}

#[test]
fn provider_error_bodies_decide_the_code() {
    let cases = [
        (400, r#"{"error":{"message":"too long","code":"context_length_exceeded"}}"#, ErrorCode::ContextLengthExceeded),
        (400, r#"{"error":{"message":"nope","type":"unsupported_parameter"}}"#, ErrorCode::UnsupportedParams),
        (500, r#"{"error":{"message":"Unable to convert openai tool calls to gemini format"}}"#, ErrorCode::ToolCallConversion),
        (401, r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#, ErrorCode::InvalidApiKey),
        (404, r#"{"error":{"message":"no such model","code":"model_not_found"}}"#, ErrorCode::ModelNotFound),
        (429, r#"{"error":{"message":"slow","type":"rate_limit_exceeded"}}"#, ErrorCode::RateLimitExceeded),
        (500, r#"{"error":{"message":"proxy","type":"BadRequestError"}}"#, ErrorCode::BadRequest),
    ];

    for (status, body, expected) in cases {
        let err = status_to_error(status, body);
        assert_eq!(err.details().and_then(|d| d.code), Some(expected), "{body}");
    }
}

#[test]
fn fatal_codes_abort_even_on_server_statuses() {
    let err = status_to_error(
        500,
        r#"{"error":{"message":"Unable to convert openai tool calls to gemini format"}}"#,
    );
    assert!(err.is_non_retriable());

    let err = status_to_error(502, "<html>bad gateway</html>");
    assert!(err.is_retryable());
    assert_eq!(err.details().and_then(|d| d.code), Some(ErrorCode::ServerError));
}

#[test]
fn status_codes_classify_plain_bodies() {
    let cases = [
        (400, ErrorCode::BadRequest),
        (403, ErrorCode::InvalidApiKey),
        (408, ErrorCode::Timeout),
        (429, ErrorCode::RateLimitExceeded),
        (503, ErrorCode::ServiceUnavailable),
        (504, ErrorCode::Timeout),
    ];
    for (status, expected) in cases {
        let err = status_to_error(status, "plain text");
        assert_eq!(err.details().and_then(|d| d.code), Some(expected), "status {status}");
    }
}
