//! Error types for the API client

use shopverse_core::ErrorCode;
use std::fmt;
use thiserror::Error;

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API client errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// API returned an error response
    #[error("API error ({status}): {message}")]
    ApiResponse {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },

    /// Directions service answered with a non-OK status
    #[error("Directions error ({status}): {message}")]
    Directions {
        /// Status string, e.g. `ZERO_RESULTS` or `REQUEST_DENIED`
        status: String,
        /// Error message, if any
        message: String,
    },

    /// Response parsed as JSON but did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Circuit breaker is open
    #[error("Circuit breaker is open - service temporarily unavailable")]
    CircuitOpen,

    /// Request timeout
    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Last error observed
        last_error: Box<ApiError>,
    },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a missing env var error
    pub fn missing_env(var: impl Into<String>) -> Self {
        Self::MissingEnvVar(var.into())
    }

    /// Create an API response error
    pub fn api_response(status: u16, message: impl Into<String>) -> Self {
        Self::ApiResponse {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the response, if the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiResponse { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(e) => {
                // Retry on connection errors, timeouts
                e.is_connect() || e.is_timeout() || e.is_request()
            }
            Self::ApiResponse { status, .. } => {
                // Retry on 5xx errors and 429 (rate limited)
                *status >= 500 || *status == 429
            }
            Self::Directions { status, .. } => {
                matches!(status.as_str(), "UNKNOWN_ERROR" | "OVER_QUERY_LIMIT")
            }
            Self::Timeout(_) => true,
            Self::CircuitOpen
            | Self::Config(_)
            | Self::MissingEnvVar(_)
            | Self::Json(_)
            | Self::Malformed(_)
            | Self::InvalidUrl(_)
            | Self::RetriesExhausted { .. } => false,
        }
    }

    /// Whether a later attempt might succeed: retryable errors, an open
    /// circuit, or a retry budget that ran out on retryable errors
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CircuitOpen => true,
            Self::RetriesExhausted { last_error, .. } => last_error.is_transient(),
            other => other.is_retryable(),
        }
    }

    /// Check if the server rejected the credentials (401)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// Map to the shared error code space
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) | Self::MissingEnvVar(_) | Self::InvalidUrl(_) => ErrorCode::ConfigError,
            Self::ApiResponse { status: 401, .. } => ErrorCode::NotAuthenticated,
            Self::ApiResponse { status: 400 | 403, .. } => ErrorCode::InvalidCredentials,
            Self::ApiResponse { .. } | Self::Json(_) | Self::Malformed(_) => ErrorCode::BackendError,
            Self::Directions { .. } => ErrorCode::RouteUnavailable,
            Self::CircuitOpen => ErrorCode::CircuitOpen,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
            Self::Request(_) => ErrorCode::NetworkError,
        }
    }
}

impl From<ApiError> for shopverse_core::Error {
    fn from(err: ApiError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let error = shopverse_core::Error::new(code, message);
        match code {
            ErrorCode::NetworkError | ErrorCode::RetriesExhausted | ErrorCode::CircuitOpen => {
                error.with_suggestion("Check your connection and the configured backend URL")
            }
            ErrorCode::InvalidCredentials => {
                error.with_suggestion("Check the email and password, then try again")
            }
            _ => error,
        }
    }
}

/// Error context for better debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Request ID for correlation
    pub request_id: Option<String>,
    /// Endpoint that was called
    pub endpoint: String,
    /// HTTP method used
    pub method: String,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)?;
        if let Some(ref id) = self.request_id {
            write!(f, " (request_id: {id})")?;
        }
        Ok(())
    }
}

/// Extract a human-readable message from a backend error body
///
/// Auth endpoints answer with `msg` or `error`/`error_description`, the
/// REST layer with `message`. Anything else falls back to the raw body.
#[must_use]
pub fn parse_error_message(body: &str) -> String {
    let field = |value: &serde_json::Value, key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = field(&value, "msg").or_else(|| field(&value, "message")) {
            return msg;
        }
        match (field(&value, "error"), field(&value, "error_description")) {
            (Some(error), Some(description)) => return format!("{error}: {description}"),
            (Some(error), None) => return error,
            (None, Some(description)) => return description,
            (None, None) => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error occurred".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_msg_field() {
        assert_eq!(
            parse_error_message(r#"{"code":400,"msg":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
    }

    #[test]
    fn test_parse_message_field() {
        assert_eq!(
            parse_error_message(r#"{"message":"JWT expired","code":"PGRST301"}"#),
            "JWT expired"
        );
    }

    #[test]
    fn test_parse_error_with_description() {
        assert_eq!(
            parse_error_message(
                r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#
            ),
            "invalid_grant: Refresh Token Not Found"
        );
        assert_eq!(parse_error_message(r#"{"error":"invalid_grant"}"#), "invalid_grant");
    }

    #[test]
    fn test_parse_fallbacks() {
        assert_eq!(parse_error_message(""), "Unknown error occurred");
        assert_eq!(parse_error_message("  "), "Unknown error occurred");
        assert_eq!(parse_error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(parse_error_message(r#"{"msg":""}"#), r#"{"msg":""}"#);
    }

    #[test]
    fn test_classification() {
        let unauthorized = ApiError::api_response(401, "JWT expired");
        assert!(unauthorized.is_unauthorized());
        assert!(unauthorized.is_client_error());
        assert!(!unauthorized.is_retryable());
        assert_eq!(unauthorized.code(), ErrorCode::NotAuthenticated);

        let unavailable = ApiError::api_response(503, "Service Unavailable");
        assert!(unavailable.is_retryable());
        assert!(unavailable.is_server_error());

        let exhausted = ApiError::RetriesExhausted {
            attempts: 3,
            last_error: Box::new(unavailable),
        };
        assert!(!exhausted.is_retryable());
        assert!(exhausted.is_transient());
        assert_eq!(exhausted.status(), Some(503));

        assert!(ApiError::CircuitOpen.is_transient());
        assert!(!ApiError::api_response(400, "bad").is_transient());
    }

    #[test]
    fn test_into_core_error() {
        let err: shopverse_core::Error = ApiError::api_response(400, "Invalid login credentials").into();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
        assert!(err.suggestion.is_some());
    }
}
