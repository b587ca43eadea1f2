//! Persistence backends for the serialized queue.
//!
//! The queue is stored as whole JSON documents under fixed keys. A backend
//! only has to read and replace those documents; quota accounting happens in
//! the stores above it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::db::{Database, KvRepository, SqliteKvRepository};
use crate::error::StorageError;

/// Device-local key/value persistence
pub trait StorageBackend: Send + Sync {
    /// Read the document stored under `key`
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the document stored under `key`
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// `SQLite`-backed storage used by the CLI and long-lived processes
pub struct SqliteBackend {
    db: Mutex<Database>,
}

impl SqliteBackend {
    /// Open (or create) the queue database at `path`
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory database (primarily for tests)
    pub fn open_in_memory() -> crate::Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }
}

impl StorageBackend for SqliteBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        SqliteKvRepository::new(db.connection())
            .get(key)
            .map_err(|error| backend_error(key, &error))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        SqliteKvRepository::new(db.connection())
            .set(key, value)
            .map_err(|error| backend_error(key, &error))
    }
}

/// In-process storage with an optional hard capacity, mirroring a
/// capacity-limited browser-style store.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
    reject_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any write whose total stored size would exceed `capacity` bytes
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Seed raw content, bypassing capacity checks
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend {
                key: key.to_string(),
                message: "write rejected".to_string(),
            });
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(capacity) = self.capacity {
            let others: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            let required = others + key.len() + value.len();
            if required > capacity {
                return Err(StorageError::QuotaExceeded {
                    required,
                    limit: capacity,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn backend_error(key: &str, error: &crate::Error) -> StorageError {
    StorageError::Backend {
        key: key.to_string(),
        message: error.to_string(),
    }
}
