//! Namespaced key wrapper with legacy key migration.

use crate::{KeyValueStore, StorageResult};
use std::sync::Arc;
use tracing::{info, warn};

/// Prefixes every key with `<namespace>.` so the client never collides with
/// unrelated data sharing the same backend.
///
/// Earlier releases wrote unprefixed keys. On a read miss the legacy key is
/// copied forward under the namespaced name and then deleted, so the
/// migration happens at most once per key.
pub struct NamespacedStore {
    prefix: String,
    inner: Arc<dyn KeyValueStore>,
}

impl NamespacedStore {
    pub fn new(namespace: &str, inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            prefix: format!("{}.", namespace),
            inner,
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn migrate_legacy(&self, key: &str, namespaced: &str) -> StorageResult<Option<String>> {
        let Some(legacy) = self.inner.get(key)? else {
            return Ok(None);
        };

        self.inner.set(namespaced, &legacy)?;
        if let Err(err) = self.inner.delete(key) {
            warn!(key = %key, error = %err, "Failed to delete migrated legacy key");
        }
        info!(key = %key, "Migrated legacy storage key into namespace");
        Ok(Some(legacy))
    }
}

impl KeyValueStore for NamespacedStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.inner.set(&self.key(key), value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let namespaced = self.key(key);
        match self.inner.get(&namespaced)? {
            Some(value) => Ok(Some(value)),
            None => self.migrate_legacy(key, &namespaced),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let removed = self.inner.delete(&self.key(key))?;
        // A legacy copy would otherwise resurrect the value on the next read.
        let removed_legacy = self.inner.delete(key)?;
        Ok(removed || removed_legacy)
    }
}
