//! Contract between the sync engine and the remote system.
//!
//! The engine does no diffing of its own. Whether a queued write may be
//! applied is entirely the remote's call: it either applies it, reports a
//! structured conflict with its current snapshot, or fails transiently.

mod http;

pub use http::HttpRemote;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::TransientSyncError;
use crate::models::{ConflictType, OfflineRecord, RecordId};

/// One write sent to the remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteWrite {
    pub record_id: RecordId,
    pub entity_type: String,
    pub action: String,
    pub payload: serde_json::Value,
    /// Local creation time; the remote compares its own modification time
    /// against it to decide whether the entity diverged
    pub expected_base_version: i64,
}

impl RemoteWrite {
    pub fn from_record(record: &OfflineRecord) -> Self {
        Self {
            record_id: record.id,
            entity_type: record.entity_type.clone(),
            action: record.action.clone(),
            payload: record.payload.clone(),
            expected_base_version: record.created_at,
        }
    }
}

/// Remote's structured divergence report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictVerdict {
    #[serde(default)]
    pub conflict_type: ConflictType,
    pub entity_id: String,
    /// Remote's current snapshot of the entity
    #[serde(default)]
    pub remote: serde_json::Value,
}

/// Successful exchange with the remote
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    Conflict(ConflictVerdict),
}

/// Remote write interface.
///
/// `force` asks the remote to overwrite unconditionally; it is only set when
/// a conflict is resolved with a local or merged payload.
pub trait RemoteWriter: Send + Sync {
    fn apply(
        &self,
        write: &RemoteWrite,
        force: bool,
    ) -> impl Future<Output = Result<ApplyOutcome, TransientSyncError>> + Send;
}
