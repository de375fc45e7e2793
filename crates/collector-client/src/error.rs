//! Collector client error types.

use thiserror::Error;

/// Transport-level failure talking to the collector.
///
/// A structured `{"type":"failure"}` body is not an error: it is returned as
/// `ApiResponse::Failure` so callers can inspect the code.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without a failure envelope
    #[error("Unexpected status {status} ({body_summary})")]
    Status { status: u16, body_summary: String },

    /// Success status with a body that is not a response envelope
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Collector unreachable
    #[error("Collector unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using CollectorError.
pub type CollectorResult<T> = Result<T, CollectorError>;
