//! File-backed durable store.
//!
//! Each key is one JSON file under the store directory, written atomically.

use crate::storage::{AtomicFile, AtomicFileError};
use async_trait::async_trait;
use pickup_core::error::{Result, SessionError};
use pickup_core::store::DurableStore;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::debug;

/// Errors raised by [`FileDurableStore`].
#[derive(Debug)]
pub enum FileStoreError {
    /// Key contains characters that cannot be used as a file name.
    InvalidKey(String),
    /// Underlying file operation failed.
    File(AtomicFileError),
    /// Blocking task could not be joined.
    Task(String),
}

impl std::fmt::Display for FileStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStoreError::InvalidKey(key) => write!(f, "Invalid store key: {:?}", key),
            FileStoreError::File(e) => write!(f, "{}", e),
            FileStoreError::Task(e) => write!(f, "Failed to spawn blocking task: {}", e),
        }
    }
}

impl std::error::Error for FileStoreError {}

impl From<AtomicFileError> for FileStoreError {
    fn from(e: AtomicFileError) -> Self {
        FileStoreError::File(e)
    }
}

impl From<FileStoreError> for SessionError {
    fn from(e: FileStoreError) -> Self {
        SessionError::storage(e.to_string())
    }
}

/// [`DurableStore`] keeping one file per key.
///
/// # Features
///
/// - **Atomic writes**: tmp file + fsync + rename
/// - **Locking**: exclusive lock file per record
/// - **Async-safe**: file IO runs in `tokio::task::spawn_blocking`
#[derive(Debug, Clone)]
pub struct FileDurableStore {
    root: PathBuf,
}

impl FileDurableStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `key`.
    pub fn record_path(&self, key: &str) -> std::result::Result<PathBuf, FileStoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(FileStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }

    fn file(&self, key: &str) -> std::result::Result<AtomicFile, FileStoreError> {
        Ok(AtomicFile::new(self.record_path(key)?))
    }
}

async fn blocking<T, F>(f: F) -> std::result::Result<T, FileStoreError>
where
    F: FnOnce() -> std::result::Result<T, AtomicFileError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| FileStoreError::Task(e.to_string()))?
        .map_err(FileStoreError::from)
}

#[async_trait]
impl DurableStore for FileDurableStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file(key)?;
        Ok(blocking(move || file.load()).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let file = self.file(key)?;
        debug!("[FileStore] Writing {}", file.path().display());
        Ok(blocking(move || file.save(&value)).await?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let file = self.file(key)?;
        debug!("[FileStore] Removing {}", file.path().display());
        Ok(blocking(move || file.remove()).await?)
    }
}
