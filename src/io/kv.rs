use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::Utc;

use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};

/// Error type for key-value storage
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("invalid key {0:?}: keys are [A-Za-z0-9_-]+")]
    InvalidKey(String),
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not remove {path}: {source}")]
    RemoveError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize {key}: {source}")]
    SerializeError {
        key: String,
        source: serde_json::Error,
    },
}

/// Synchronous storage of named string blobs. No business logic lives here.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;
    fn remove(&self, key: &str) -> Result<(), KvError>;

    /// Keep a copy of a blob that is about to be lost, so it can be
    /// recovered by hand. Stores without a recovery area ignore this.
    fn preserve(&self, _category: RecoveryCategory, _key: &str, _raw: &str, _reason: &str) {}
}

/// Blobs stored as `<key>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(FileKvStore {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, KvError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(KvError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.blob_path(key).ok()?;
        fs::read_to_string(path).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let path = self.blob_path(key)?;
        recovery::atomic_write(&path, value.as_bytes())
            .map_err(|source| KvError::WriteError { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(KvError::RemoveError { path, source }),
        }
    }

    fn preserve(&self, category: RecoveryCategory, key: &str, raw: &str, reason: &str) {
        // a malformed blob stays on disk until rewritten, so every read sees it
        if category == RecoveryCategory::Malformed
            && recovery::is_logged(&self.dir, category, key, raw)
        {
            tracing::debug!(key, "malformed blob already preserved");
            return;
        }
        recovery::log_recovery(
            &self.dir,
            RecoveryEntry {
                timestamp: Utc::now(),
                category,
                description: reason.to_string(),
                fields: vec![("Key".to_string(), key.to_string())],
                body: raw.to_string(),
            },
        );
    }
}

/// In-memory store. Clones share the same blobs, so one handle can be given
/// to the task store and another to the focus machine.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    blobs: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.borrow().keys().cloned().collect()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.blobs.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        self.blobs.borrow_mut().remove(key);
        Ok(())
    }
}
