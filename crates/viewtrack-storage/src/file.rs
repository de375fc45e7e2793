//! File-backed storage.
//!
//! The whole map lives in memory and is written back as a JSON object after
//! every mutation, through a temp file and rename so a crash never leaves a
//! half-written file behind. A mutation only becomes visible once the write
//! succeeded.

use crate::{KeyValueStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key/value store persisted to a single JSON file.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty. An unreadable or malformed file is logged
    /// and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Discarding malformed storage file");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(StorageError::Io(err)),
        };

        debug!(path = %path.display(), keys = data.len(), "Opened file store");

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> StorageResult<()> {
        let payload = serde_json::to_string(data)?;
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "storage.json".to_string());
        let tmp_path = self
            .path
            .with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));

        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(payload.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::Io(err));
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock();
        let mut updated = data.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *data = updated;
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock();
        if !data.contains_key(key) {
            return Ok(false);
        }
        let mut updated = data.clone();
        updated.remove(key);
        self.persist(&updated)?;
        *data = updated;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(&path).unwrap();
        store.set("participantCode", "P1").unwrap();
        store.set("events", "[]").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("participantCode").unwrap().as_deref(), Some("P1"));
        assert_eq!(reopened.get("events").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_file_store_delete_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(&path).unwrap();
        store.set("k", "v").unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());

        let reopened = FileStore::open(&path).unwrap();
        assert!(!reopened.has("k").unwrap());
    }

    #[test]
    fn test_file_store_malformed_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{\"truncated\": ").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("truncated").unwrap(), None);

        store.set("fresh", "1").unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("fresh").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_file_store_failed_write_is_not_visible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("storage.json");

        let store = FileStore::open(&path).unwrap();
        store.set("kept", "1").unwrap();

        // Replace the parent directory with a file so the temp file cannot be created.
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path.parent().unwrap(), "blocker").unwrap();

        assert!(matches!(store.set("lost", "2"), Err(StorageError::Io(_))));
        assert_eq!(store.get("lost").unwrap(), None);

        assert!(matches!(store.delete("kept"), Err(StorageError::Io(_))));
        assert_eq!(store.get("kept").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("storage.json");

        let store = FileStore::open(&path).unwrap();
        store.set("k", "v").unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }
}
