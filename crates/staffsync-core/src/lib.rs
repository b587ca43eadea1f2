//! staffsync-core - Core library for staffsync
//!
//! This crate contains the offline write queue, the sync executor, conflict
//! handling and the persistence layer shared by every staffsync front-end
//! (dashboard shell, CLI).

pub mod config;
pub mod conflict;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod network;
pub mod remote;
pub mod state;
pub mod store;
pub mod util;

pub use config::EngineConfig;
pub use engine::{ResolveAction, ResolveOutcome, RunOutcome, SyncEngine, SyncReport};
pub use error::{Error, Result, StorageError, TransientSyncError};
pub use events::SyncEvent;
pub use models::{
    ConflictId, ConflictType, OfflineRecord, RecordId, Resolution, StorageStats, SyncConflict,
    SyncStatus,
};
pub use state::SyncState;
