//! Outbox error types.

use event_protocol_types::RecordError;
use participant_auth::AuthError;
use thiserror::Error;
use viewtrack_storage::StorageError;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Session bootstrap failed before the event could be sent
    #[error("Session error: {0}")]
    Session(#[from] AuthError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Persisted queue could not be reconstructed
    #[error("Queue record error: {0}")]
    Record(#[from] RecordError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Queue blob could not be compressed or decompressed
    #[error("Compression error: {0}")]
    Compression(String),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;
