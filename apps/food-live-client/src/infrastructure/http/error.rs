//! API error types.

use thiserror::Error;

/// Errors from the request/response API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Request could not be sent or the response could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Session is missing or expired and could not be refreshed.
    #[error("unauthorized")]
    Unauthorized,

    /// Envelope reported `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_code() {
        let err = ApiError::Status {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected status 404: not found");
    }

    #[test]
    fn json_errors_become_decode_errors() {
        let err: ApiError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
