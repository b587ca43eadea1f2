//! Offline record model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a queued record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Sync state of a queued record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Waiting for the next run
    #[default]
    Pending,
    /// Applied remotely; terminal
    Synced,
    /// Last attempt failed; still retried until the retry cap
    Failed,
}

impl SyncStatus {
    /// Lowercase label used in listings
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write queued while offline, replayed against the remote by the sync executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineRecord {
    /// Unique identifier
    pub id: RecordId,
    /// Domain object tag (attendance, leave, timesheet, ...)
    pub entity_type: String,
    /// Human-readable operation label
    pub action: String,
    /// Opaque data replayed against the remote
    pub payload: serde_json::Value,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Current sync state
    pub sync_status: SyncStatus,
    /// Number of failed attempts since creation or last manual reset
    pub retry_count: u32,
    /// Description of the most recent failure
    #[serde(default)]
    pub last_error: Option<String>,
    /// When the record was applied remotely (Unix ms)
    #[serde(default)]
    pub synced_at: Option<i64>,
}

impl OfflineRecord {
    /// Create a new pending record
    #[must_use]
    pub fn new(
        entity_type: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: RecordId::new(),
            entity_type: entity_type.into(),
            action: action.into(),
            payload,
            created_at: chrono::Utc::now().timestamp_millis(),
            sync_status: SyncStatus::Pending,
            retry_count: 0,
            last_error: None,
            synced_at: None,
        }
    }

    /// Whether the record still needs to reach the remote
    pub fn is_unsynced(&self) -> bool {
        matches!(self.sync_status, SyncStatus::Pending | SyncStatus::Failed)
    }

    /// Whether automatic runs have given up on this record
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.is_unsynced() && self.retry_count >= max_retries
    }

    /// Whether an automatic run should pick this record up
    pub fn is_retry_eligible(&self, max_retries: u32) -> bool {
        self.is_unsynced() && self.retry_count < max_retries
    }
}

/// Partial update applied by the sync executor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub sync_status: Option<SyncStatus>,
    pub retry_count: Option<u32>,
    /// `Some(None)` clears the error
    pub last_error: Option<Option<String>>,
    pub synced_at: Option<i64>,
}

impl RecordPatch {
    /// Mark the record as applied remotely
    #[must_use]
    pub const fn synced(at: i64) -> Self {
        Self {
            sync_status: Some(SyncStatus::Synced),
            retry_count: None,
            last_error: None,
            synced_at: Some(at),
        }
    }

    /// Record a failed attempt
    #[must_use]
    pub fn failed(retry_count: u32, error: impl Into<String>) -> Self {
        Self {
            sync_status: Some(SyncStatus::Failed),
            retry_count: Some(retry_count),
            last_error: Some(Some(error.into())),
            synced_at: None,
        }
    }

    /// Put the record back in the queue without touching its retry count
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            sync_status: Some(SyncStatus::Pending),
            retry_count: None,
            last_error: None,
            synced_at: None,
        }
    }

    /// Manual "retry failed": zero the retry count and clear the error
    #[must_use]
    pub const fn reset() -> Self {
        Self {
            sync_status: Some(SyncStatus::Pending),
            retry_count: Some(0),
            last_error: Some(None),
            synced_at: None,
        }
    }

    /// Apply this patch to a record
    pub fn apply_to(&self, record: &mut OfflineRecord) {
        if let Some(status) = self.sync_status {
            record.sync_status = status;
        }
        if let Some(retry_count) = self.retry_count {
            record.retry_count = retry_count;
        }
        if let Some(last_error) = &self.last_error {
            record.last_error.clone_from(last_error);
        }
        if let Some(synced_at) = self.synced_at {
            record.synced_at = Some(synced_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_unique() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_new_is_pending() {
        let record = OfflineRecord::new("attendance", "Clock in", json!({"employee": 7}));
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert_eq!(record.retry_count, 0);
        assert!(record.last_error.is_none());
        assert!(record.synced_at.is_none());
        assert!(record.created_at > 0);
    }

    #[test]
    fn test_retry_eligibility_and_exhaustion() {
        let mut record = OfflineRecord::new("leave", "Request leave", json!({}));
        assert!(record.is_retry_eligible(3));

        RecordPatch::failed(3, "timeout").apply_to(&mut record);
        assert!(!record.is_retry_eligible(3));
        assert!(record.is_exhausted(3));

        RecordPatch::reset().apply_to(&mut record);
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert_eq!(record.retry_count, 0);
        assert!(record.last_error.is_none());
    }

    #[test]
    fn test_synced_record_is_never_eligible() {
        let mut record = OfflineRecord::new("timesheet", "Submit week", json!({}));
        RecordPatch::synced(42).apply_to(&mut record);
        assert!(!record.is_unsynced());
        assert!(!record.is_exhausted(3));
        assert_eq!(record.synced_at, Some(42));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let value = serde_json::to_value(SyncStatus::Failed).unwrap();
        assert_eq!(value, json!("failed"));
    }
}
