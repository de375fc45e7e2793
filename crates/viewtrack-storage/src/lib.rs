//! Key/value storage for the viewtrack client.
//!
//! The client keeps its state in two scopes:
//! - **local**: survives restarts (participant code, retry queue, config cache)
//! - **session**: lives as long as the browsing session (session identifier)
//!
//! Backends:
//! - [`MemoryStore`]: process-lifetime map, used for the session scope and tests
//! - [`FileStore`]: JSON object file rewritten atomically on every mutation
//! - [`NamespacedStore`]: prefixes keys and migrates legacy unprefixed entries

mod file;
mod keys;
mod memory;
mod namespaced;
mod traits;

pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use namespaced::NamespacedStore;
pub use traits::KeyValueStore;

use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The two storage scopes the client writes to.
#[derive(Clone)]
pub struct Stores {
    /// Long-lived scope.
    pub local: Arc<dyn KeyValueStore>,
    /// Session scope.
    pub session: Arc<dyn KeyValueStore>,
}

impl Stores {
    pub fn new(local: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { local, session }
    }

    /// Both scopes wrapped in the given key namespace.
    pub fn namespaced(
        namespace: &str,
        local: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            local: Arc::new(NamespacedStore::new(namespace, local)),
            session: Arc::new(NamespacedStore::new(namespace, session)),
        }
    }

    /// Fresh in-memory scopes.
    pub fn in_memory() -> Self {
        Self {
            local: Arc::new(MemoryStore::new()),
            session: Arc::new(MemoryStore::new()),
        }
    }
}
