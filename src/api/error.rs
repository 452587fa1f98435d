//! Error types for the remote OCR service client.
//!
//! Only [`Submission`](ApiError::Submission) carries business meaning; the
//! remaining variants are transport-level and treated as transient by the
//! orchestrator.

use thiserror::Error;

/// Errors that can occur while talking to the OCR service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service did not acknowledge a job submission with `status: success`.
    /// `status_code` is the HTTP status, `message` the body or the service's own message.
    #[error("submission rejected (status {status_code}): {message}")]
    Submission { status_code: u16, message: String },

    /// A non-200 answer to a status or engine query.
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// The response arrived but did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The configured base URL cannot be used to build endpoint URLs.
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// Underlying network failure (DNS, refused connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ApiError::InvalidUrl(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_display() {
        let err = ApiError::Submission {
            status_code: 401,
            message: "Invalid API key".into(),
        };
        assert_eq!(
            err.to_string(),
            "submission rejected (status 401): Invalid API key"
        );
    }

    #[test]
    fn status_display() {
        let err = ApiError::Status {
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "API error (status 503): maintenance");
    }

    #[test]
    fn invalid_url_is_not_transient() {
        assert!(!ApiError::InvalidUrl("mailto:x".into()).is_transient());
        assert!(ApiError::Decode("missing field".into()).is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
