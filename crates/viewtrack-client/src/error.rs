//! Client error types.

use collector_client::CollectorError;
use event_outbox::OutboxError;
use participant_auth::AuthError;
use thiserror::Error;
use viewtrack_config_and_utils::CoreError;
use viewtrack_storage::StorageError;

/// Errors surfaced by [`crate::InstrumentationClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration or path error
    #[error("Config error: {0}")]
    Core(#[from] CoreError),

    /// Storage backend could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Collector client could not be built
    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Identity or session error
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Delivery error
    #[error("Delivery error: {0}")]
    Outbox(#[from] OutboxError),
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
