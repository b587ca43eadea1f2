//! Data models for staffsync

mod record;
mod stats;
mod sync_conflict;

pub use record::{OfflineRecord, RecordId, RecordPatch, SyncStatus};
pub use stats::StorageStats;
pub use sync_conflict::{ConflictId, ConflictType, Resolution, SyncConflict};
