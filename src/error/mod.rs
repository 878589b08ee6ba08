//! Error types for relay.

pub mod unified;

pub use unified::{ErrorCategory, ErrorCode, ErrorDetails};

use thiserror::Error;

/// Primary error type for all relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<ErrorDetails>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("LLM timed out after {0}ms")]
    Timeout(u64),

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("ToolChoice.REQUIRED could not be satisfied after {attempts} attempt(s)")]
    MissingToolCalls { attempts: u32 },

    #[error("Invalid tool call response: {0}")]
    InvalidToolCalls(String),

    #[error("Tool call validation failed: {0}")]
    ToolValidation(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Interrupted")]
    Interrupted,
}

impl RelayError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            source: None,
            details: None,
        }
    }

    /// Create an API error with structured details.
    pub fn api_with_details(status: u16, message: impl Into<String>, details: ErrorDetails) -> Self {
        Self::Api {
            status,
            message: message.into(),
            source: None,
            details: Some(details),
        }
    }

    /// HTTP-equivalent status for errors that have one. Local timeouts report 504.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Timeout(_) => Some(504),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Structured details, if the transport attached any.
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Self::Api { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Network(_) => ErrorCategory::Network,
            Self::Io(_) => ErrorCategory::Unknown,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::EmptyResponse => ErrorCategory::EmptyResponse,
            Self::MissingToolCalls { .. } => ErrorCategory::MissingToolCalls,
            Self::InvalidToolCalls(_) | Self::ToolValidation(_) => ErrorCategory::Emulation,
            Self::Interrupted => ErrorCategory::Interrupted,
            Self::Stream(_) => ErrorCategory::Api,
            Self::InvalidState(_) => ErrorCategory::Unknown,
            Self::Api {
                status, details, ..
            } => {
                let code = details.as_ref().and_then(|d| d.code);
                match (*status, code) {
                    (_, Some(ErrorCode::BadRequest))
                    | (_, Some(ErrorCode::UnsupportedParams))
                    | (_, Some(ErrorCode::ToolCallConversion))
                    | (_, Some(ErrorCode::ContextLengthExceeded)) => ErrorCategory::BadRequest,
                    (_, Some(ErrorCode::InvalidApiKey)) | (401 | 403, _) => {
                        ErrorCategory::Authentication
                    }
                    (_, Some(ErrorCode::RateLimitExceeded)) | (429, _) => ErrorCategory::RateLimit,
                    (400, _) => ErrorCategory::BadRequest,
                    (504, _) => ErrorCategory::Timeout,
                    (500..=599, _) => ErrorCategory::Server,
                    _ => ErrorCategory::Api,
                }
            }
        }
    }

    /// Whether resending the same request cannot succeed.
    ///
    /// Anything not listed here is treated as transient and retried.
    pub fn is_non_retriable(&self) -> bool {
        if let Some(details) = self.details() {
            if details.non_retriable || details.code.is_some_and(ErrorCode::is_fatal) {
                return true;
            }
        }
        matches!(
            self.category(),
            ErrorCategory::BadRequest
                | ErrorCategory::Authentication
                | ErrorCategory::Configuration
                | ErrorCategory::Interrupted
                | ErrorCategory::MissingToolCalls
        )
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_non_retriable()
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RelayError>;
