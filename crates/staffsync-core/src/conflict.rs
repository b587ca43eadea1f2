//! Persisted log of detected sync conflicts.

use std::sync::Arc;

use crate::error::StorageError;
use crate::models::{ConflictId, RecordId, Resolution, SyncConflict};
use crate::store::{load_collection, serialize_collection, StorageBackend};

/// Storage key of the serialized conflict collection
pub const CONFLICTS_KEY: &str = "sync_conflicts";

/// Conflicts in detection order, persisted as one document
pub struct ConflictLog {
    backend: Arc<dyn StorageBackend>,
    conflicts: Vec<SyncConflict>,
}

impl ConflictLog {
    /// Load the log from `backend`. Unparsable stored data is discarded.
    pub fn open(backend: Arc<dyn StorageBackend>) -> Result<Self, StorageError> {
        let conflicts = load_collection(backend.as_ref(), CONFLICTS_KEY)?;
        Ok(Self { backend, conflicts })
    }

    /// Store a newly detected conflict
    pub fn insert(&mut self, conflict: SyncConflict) -> Result<(), StorageError> {
        let mut next = self.conflicts.clone();
        next.push(conflict);
        self.commit(next)
    }

    /// Set the resolution of an unresolved conflict.
    ///
    /// Returns `Ok(false)` if the conflict is unknown or already resolved;
    /// a resolution is never overwritten.
    pub fn mark_resolved(
        &mut self,
        id: &ConflictId,
        resolution: Resolution,
        resolved_at: i64,
    ) -> Result<bool, StorageError> {
        let Some(index) = self.conflicts.iter().position(|c| c.id == *id) else {
            return Ok(false);
        };
        if self.conflicts[index].is_resolved() {
            return Ok(false);
        }

        let mut next = self.conflicts.clone();
        next[index].resolution = Some(resolution);
        next[index].resolved_at = Some(resolved_at);
        self.commit(next)?;
        Ok(true)
    }

    /// Drop resolved conflicts from storage; returns how many were removed.
    pub fn archive_resolved(&mut self) -> Result<usize, StorageError> {
        let next: Vec<_> = self
            .conflicts
            .iter()
            .filter(|conflict| !conflict.is_resolved())
            .cloned()
            .collect();
        let removed = self.conflicts.len() - next.len();
        if removed > 0 {
            self.commit(next)?;
        }
        Ok(removed)
    }

    pub fn get(&self, id: &ConflictId) -> Option<&SyncConflict> {
        self.conflicts.iter().find(|conflict| conflict.id == *id)
    }

    /// Open conflict raised by `record_id`, if any
    pub fn unresolved_for_record(&self, record_id: &RecordId) -> Option<&SyncConflict> {
        self.conflicts
            .iter()
            .find(|conflict| conflict.record_id == *record_id && !conflict.is_resolved())
    }

    /// Unresolved conflicts, oldest first
    pub fn unresolved(&self) -> Vec<SyncConflict> {
        self.conflicts
            .iter()
            .filter(|conflict| !conflict.is_resolved())
            .cloned()
            .collect()
    }

    pub fn all(&self) -> &[SyncConflict] {
        &self.conflicts
    }

    fn commit(&mut self, next: Vec<SyncConflict>) -> Result<(), StorageError> {
        let serialized = serialize_collection(CONFLICTS_KEY, &next)?;
        self.backend.save(CONFLICTS_KEY, &serialized)?;
        self.conflicts = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, OfflineRecord};
    use crate::store::MemoryBackend;
    use serde_json::json;

    fn conflict_for(record: &OfflineRecord) -> SyncConflict {
        SyncConflict::detected(
            record,
            ConflictType::ConcurrentEdit,
            "timesheet-4",
            json!({"hours": 40}),
        )
    }

    #[test]
    fn resolution_is_monotonic() {
        let mut log = ConflictLog::open(Arc::new(MemoryBackend::new())).unwrap();
        let record = OfflineRecord::new("timesheet", "Submit", json!({"hours": 38}));
        let conflict = conflict_for(&record);
        let id = conflict.id;
        log.insert(conflict).unwrap();

        assert!(log.mark_resolved(&id, Resolution::UseRemote, 10).unwrap());
        assert!(!log.mark_resolved(&id, Resolution::UseLocal, 20).unwrap());

        let stored = log.get(&id).unwrap();
        assert_eq!(stored.resolution, Some(Resolution::UseRemote));
        assert_eq!(stored.resolved_at, Some(10));
        assert!(log.unresolved().is_empty());
        assert!(log.unresolved_for_record(&record.id).is_none());
    }

    #[test]
    fn reopen_restores_conflicts() {
        let backend = Arc::new(MemoryBackend::new());
        let record = OfflineRecord::new("leave", "Request", json!({}));
        {
            let mut log = ConflictLog::open(backend.clone()).unwrap();
            log.insert(conflict_for(&record)).unwrap();
        }

        let log = ConflictLog::open(backend).unwrap();
        assert_eq!(log.unresolved().len(), 1);
        assert!(log.unresolved_for_record(&record.id).is_some());
    }

    #[test]
    fn archive_resolved_keeps_open_conflicts() {
        let mut log = ConflictLog::open(Arc::new(MemoryBackend::new())).unwrap();
        let record = OfflineRecord::new("leave", "Request", json!({}));
        let resolved = conflict_for(&record);
        let resolved_id = resolved.id;
        log.insert(resolved).unwrap();
        log.insert(conflict_for(&record)).unwrap();
        log.mark_resolved(&resolved_id, Resolution::Merge, 1).unwrap();

        assert_eq!(log.archive_resolved().unwrap(), 1);
        assert_eq!(log.all().len(), 1);
        assert!(log.get(&resolved_id).is_none());
    }
}
