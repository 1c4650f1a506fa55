//! Durable key-value store trait.
//!
//! Defines the persistence facility the session manager writes its snapshot
//! to. Implementations must survive process restarts; [`MemoryStore`] does not
//! and exists for hosts without a disk and for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, SessionError};

/// Persistent string storage keyed by name.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads a record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: record exists
    /// - `Ok(None)`: no record under `key`
    /// - `Err(SessionError::Storage)`: the store could not be read
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a record, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Deletes a record. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value stored under `key`, bypassing the async API.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    /// Seeds a record, bypassing the async API.
    pub fn insert_raw(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.into());
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| SessionError::storage(format!("memory store poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| SessionError::storage(format!("memory store poisoned: {}", e)))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| SessionError::storage(format!("memory store poisoned: {}", e)))?;
        entries.remove(key);
        Ok(())
    }
}
