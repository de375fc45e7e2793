//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client files (~/.viewtrack)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.viewtrack`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".viewtrack"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.viewtrack).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.viewtrack/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the long-lived key/value storage file (~/.viewtrack/storage.json).
    pub fn storage_file(&self) -> PathBuf {
        self.base_dir.join("storage.json")
    }

    /// Get the logs directory (~/.viewtrack/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the client log file path (~/.viewtrack/logs/client.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("client.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_layout() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/vt"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/vt/config.json"));
        assert_eq!(paths.storage_file(), PathBuf::from("/tmp/vt/storage.json"));
        assert_eq!(paths.log_file(), PathBuf::from("/tmp/vt/logs/client.jsonl"));
    }

    #[test]
    fn test_ensure_dirs_creates_logs_dir() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested"));
        paths.ensure_dirs().unwrap();
        assert!(paths.logs_dir().is_dir());
    }
}
