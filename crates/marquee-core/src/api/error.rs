use serde_json::Value;
use thiserror::Error;

/// Status reported for a request that ran out of time.
pub const TIMEOUT_STATUS: u16 = 408;

/// Status reported when no HTTP response was received at all.
pub const NETWORK_STATUS: u16 = 0;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in log lines
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build an `Http` error from a non-success response body.
    ///
    /// A JSON body with a string `message` field supplies the message; any
    /// other body falls back to a generic one. Non-JSON bodies are dropped.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        ApiError::Http {
            status,
            message,
            body: parsed,
        }
    }

    /// The status code this error reports to callers.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Timeout { .. } => TIMEOUT_STATUS,
            ApiError::Network { .. } => NETWORK_STATUS,
            ApiError::Http { status, .. } => *status,
            ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => NETWORK_STATUS,
        }
    }

    /// Message suitable for inline display in the shell.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Timeout { .. } => "Connection timed out. Please try again.".to_string(),
            ApiError::Network { .. } => {
                "Unable to connect to server. Check your connection.".to_string()
            }
            ApiError::Http { message, .. } => message.clone(),
            ApiError::InvalidResponse(_) => "The server sent an unexpected response.".to_string(),
            ApiError::InvalidRequest(_) => "The request could not be encoded.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_status_uses_server_message() {
        let err = ApiError::from_status(500, r#"{"message":"db down"}"#);
        match err {
            ApiError::Http { status, message, body } => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
                assert_eq!(body, Some(json!({"message": "db down"})));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_status_without_message_field() {
        let err = ApiError::from_status(404, r#"{"error":"missing"}"#);
        match err {
            ApiError::Http { message, body, .. } => {
                assert_eq!(message, "Request failed with status 404");
                assert!(body.is_some());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_status_non_json_body() {
        let err = ApiError::from_status(502, "<html>Bad Gateway</html>");
        match err {
            ApiError::Http { message, body, .. } => {
                assert_eq!(message, "Request failed with status 502");
                assert!(body.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Timeout { timeout_ms: 10 }.status(), 408);
        assert_eq!(
            ApiError::Network {
                message: "refused".into()
            }
            .status(),
            0
        );
        assert_eq!(ApiError::from_status(503, "").status(), 503);
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.contains("600 total bytes"));
    }
}
