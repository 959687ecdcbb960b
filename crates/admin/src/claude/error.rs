//! Errors from the Messages API client.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response with the API's error type and message.
    #[error("API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    /// 429; the value is `Retry-After` in seconds.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// 529 or an `overloaded_error` body.
    #[error("API overloaded")]
    Overloaded,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The response arrived but is not the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The client could not be built (bad API key characters, TLS setup).
    #[error("client setup failed: {0}")]
    Setup(String),
}

/// `{"type": "error", "error": {"type": ..., "message": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl ClaudeError {
    /// Classify an error body that came back with a non-success status
    /// other than 401 or 429. A body that is not the API's error envelope
    /// is kept verbatim as the message.
    #[must_use]
    pub fn from_error_body(status: u16, body: &str) -> Self {
        let (error_type, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.kind, envelope.error.message),
            Err(_) => (format!("http_{status}"), body.trim().to_string()),
        };
        if status == 529 || error_type == "overloaded_error" {
            return Self::Overloaded;
        }
        Self::Api { error_type, message }
    }

    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Overloaded | Self::Http(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_is_unpacked() {
        let body = r#"{
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "max_tokens is too large"}
        }"#;
        let err = ClaudeError::from_error_body(400, body);
        assert_eq!(err.to_string(), "API error (invalid_request_error): max_tokens is too large");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_overloaded_by_status_or_type() {
        assert!(matches!(ClaudeError::from_error_body(529, ""), ClaudeError::Overloaded));
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        let err = ClaudeError::from_error_body(500, body);
        assert!(matches!(err, ClaudeError::Overloaded));
        assert!(err.is_transient());
    }

    #[test]
    fn test_plain_body_kept_as_message() {
        let err = ClaudeError::from_error_body(502, "bad gateway\n");
        assert!(
            matches!(err, ClaudeError::Api { ref error_type, ref message } if error_type == "http_502" && message == "bad gateway")
        );
    }

    #[test]
    fn test_rate_limit_display() {
        assert_eq!(
            ClaudeError::RateLimited(30).to_string(),
            "rate limited, retry after 30 seconds"
        );
    }
}
