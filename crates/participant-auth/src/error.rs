//! Identity and session error types.

use thiserror::Error;
use viewtrack_storage::StorageError;

/// Errors surfaced to callers of identity/session operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No participant code is set
    #[error("No participant code set")]
    MissingIdentity,

    /// The collector rejected the session request or could not be reached
    #[error("Session creation failed: {0}")]
    SessionCreationFailed(String),

    /// The collector rejected the config request or could not be reached
    #[error("Config fetch failed: {0}")]
    ConfigFetchFailed(String),

    /// Persisting identity state failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
