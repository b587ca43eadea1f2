//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::record::{OfflineRecord, RecordId};

/// Identifier of a detected conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictId(Uuid);

impl ConflictId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Classification of the divergence reported by the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Both sides edited the entity
    #[default]
    ConcurrentEdit,
    /// The remote deleted what we are updating
    DeleteVsUpdate,
    /// Anything else the remote reports
    #[serde(other)]
    Other,
}

impl ConflictType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConcurrentEdit => "concurrent_edit",
            Self::DeleteVsUpdate => "delete_vs_update",
            Self::Other => "other",
        }
    }
}

/// How a conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Local payload was force-written
    UseLocal,
    /// Remote value kept, local write dropped
    UseRemote,
    /// A caller-supplied merged payload was written
    Merge,
}

impl Resolution {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UseLocal => "use_local",
            Self::UseRemote => "use_remote",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Divergence between a queued write and the remote's current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict identifier
    pub id: ConflictId,
    /// Queued record whose application was refused
    pub record_id: RecordId,
    /// Domain object tag copied from the record
    pub entity_type: String,
    /// Remote identifier of the divergent entity
    pub entity_id: String,
    /// Operation label copied from the record
    pub action: String,
    /// Divergence classification
    pub conflict_type: ConflictType,
    /// Local payload at detection time
    pub local_data: serde_json::Value,
    /// Remote snapshot at detection time
    pub remote_data: serde_json::Value,
    /// Detection timestamp (unix ms)
    pub detected_at: i64,
    /// Set once resolved; never unset
    #[serde(default)]
    pub resolution: Option<Resolution>,
    /// Resolution timestamp (unix ms)
    #[serde(default)]
    pub resolved_at: Option<i64>,
}

impl SyncConflict {
    /// Capture a conflict for `record` from the remote's verdict
    #[must_use]
    pub fn detected(
        record: &OfflineRecord,
        conflict_type: ConflictType,
        entity_id: impl Into<String>,
        remote_data: serde_json::Value,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            record_id: record.id,
            entity_type: record.entity_type.clone(),
            entity_id: entity_id.into(),
            action: record.action.clone(),
            conflict_type,
            local_data: record.payload.clone(),
            remote_data,
            detected_at: chrono::Utc::now().timestamp_millis(),
            resolution: None,
            resolved_at: None,
        }
    }

    pub const fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detected_conflict_snapshots_local_payload() {
        let record = OfflineRecord::new("leave", "Approve leave", json!({"days": 2}));
        let conflict = SyncConflict::detected(
            &record,
            ConflictType::ConcurrentEdit,
            "leave-9",
            json!({"days": 3}),
        );

        assert_eq!(conflict.record_id, record.id);
        assert_eq!(conflict.local_data, json!({"days": 2}));
        assert_eq!(conflict.remote_data, json!({"days": 3}));
        assert!(!conflict.is_resolved());
    }

    #[test]
    fn unknown_conflict_type_maps_to_other() {
        let parsed: ConflictType = serde_json::from_value(json!("schema_drift")).unwrap();
        assert_eq!(parsed, ConflictType::Other);
        let parsed: ConflictType = serde_json::from_value(json!("delete_vs_update")).unwrap();
        assert_eq!(parsed, ConflictType::DeleteVsUpdate);
    }
}
