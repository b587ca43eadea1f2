//! Error types for staffsync-core

use thiserror::Error;

/// Result type alias using staffsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in staffsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record or conflict not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local persistence rejected a write
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Remote application failed in a way that may succeed later
    #[error(transparent)]
    Sync(#[from] TransientSyncError),
}

/// A persistence write was rejected. The in-memory state is left untouched.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The serialized collection would not fit in the configured quota
    #[error("Storage quota exceeded: {required} bytes needed, limit is {limit} bytes")]
    QuotaExceeded { required: usize, limit: usize },

    /// The collection could not be serialized
    #[error("Failed to serialize '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend refused or failed the read/write
    #[error("Storage backend failed for '{key}': {message}")]
    Backend { key: String, message: String },
}

/// A per-record remote failure that is expected to succeed on retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransientSyncError {
    /// The request never got a response
    #[error("Network error: {0}")]
    Network(String),

    /// The remote answered with a non-success status
    #[error("Remote rejected write ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The remote answered with something we could not interpret
    #[error("Invalid remote response: {0}")]
    InvalidResponse(String),

    /// The remote is not reachable or not configured
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}
