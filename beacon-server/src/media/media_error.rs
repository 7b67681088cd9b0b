use std::time::Duration;
use thiserror::Error;

/// Failures reported by a media server backend.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("connection to media server failed: {0}")]
    Connect(String),

    #[error("media server error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("media server connection closed")]
    Closed,

    #[error("unexpected media server payload: {0}")]
    Protocol(String),

    #[error("invalid SDP offer: {0}")]
    InvalidOffer(String),
}

impl From<serde_json::Error> for MediaError {
    fn from(e: serde_json::Error) -> Self {
        MediaError::Protocol(e.to_string())
    }
}
