//! Unified error classification.

use serde::{Deserialize, Serialize};

/// Machine-readable error code attached by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidApiKey,
    RateLimitExceeded,
    ModelNotFound,
    /// The provider rejected the request as malformed; resending it cannot help.
    BadRequest,
    /// The request carried parameters the provider does not accept.
    UnsupportedParams,
    /// The provider (or a proxy in front of it) could not translate tool calls.
    ToolCallConversion,
    ContextLengthExceeded,
    ServerError,
    ServiceUnavailable,
    Timeout,
    NetworkError,
    Unknown,
}

impl ErrorCode {
    /// Codes that abort retrying immediately.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::InvalidApiKey
                | Self::ModelNotFound
                | Self::BadRequest
                | Self::UnsupportedParams
                | Self::ToolCallConversion
                | Self::ContextLengthExceeded
        )
    }
}

/// Broad error category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    BadRequest,
    Api,
    EmptyResponse,
    MissingToolCalls,
    Emulation,
    Interrupted,
    Configuration,
    Serialization,
    Unknown,
}

/// Structured details returned by a provider API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: Option<ErrorCode>,
    pub provider_code: Option<String>,
    pub param: Option<String>,
    /// Set by the transport when it knows the failure is permanent.
    #[serde(default)]
    pub non_retriable: bool,
}

impl ErrorDetails {
    pub fn with_code(code: ErrorCode) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }

    pub fn non_retriable(mut self) -> Self {
        self.non_retriable = true;
        self
    }
}
