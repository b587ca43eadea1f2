//! Durable record queue with quota accounting.

mod backend;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::models::{OfflineRecord, RecordId, RecordPatch, SyncStatus};

/// Storage key of the serialized record collection
pub const RECORDS_KEY: &str = "offline_records";

/// Default quota for the serialized record collection (5 MiB)
pub const DEFAULT_STORAGE_LIMIT: usize = 5 * 1024 * 1024;

/// Queue of offline writes, kept in creation order and persisted as one
/// document on every mutation.
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    records: Vec<OfflineRecord>,
    size_bytes: usize,
    storage_limit: usize,
}

impl RecordStore {
    /// Load the queue from `backend`. Unparsable stored data is discarded.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        storage_limit: usize,
    ) -> Result<Self, StorageError> {
        let mut records: Vec<OfflineRecord> = load_collection(backend.as_ref(), RECORDS_KEY)?;
        records.sort_by_key(|record| record.created_at);
        let size_bytes = serialize_collection(RECORDS_KEY, &records)?.len();

        tracing::debug!(
            "Loaded {} offline records ({} bytes)",
            records.len(),
            size_bytes
        );

        Ok(Self {
            backend,
            records,
            size_bytes,
            storage_limit,
        })
    }

    /// Queue a new write. On failure nothing is added.
    pub fn append(&mut self, record: OfflineRecord) -> Result<OfflineRecord, StorageError> {
        let mut record = record;
        record.sync_status = SyncStatus::Pending;
        record.retry_count = 0;
        record.last_error = None;
        record.synced_at = None;

        let mut next = self.records.clone();
        next.push(record.clone());
        self.commit(next, true)?;
        Ok(record)
    }

    /// Apply a partial update.
    ///
    /// Returns `Ok(false)` when the record no longer exists or is already
    /// synced; neither is an error because a concurrent clear may have run.
    pub fn update(&mut self, id: &RecordId, patch: &RecordPatch) -> Result<bool, StorageError> {
        let Some(index) = self.position(id) else {
            tracing::debug!("Skipping update for missing record {}", id);
            return Ok(false);
        };
        if self.records[index].sync_status == SyncStatus::Synced {
            tracing::debug!("Skipping update for synced record {}", id);
            return Ok(false);
        }

        let mut next = self.records.clone();
        patch.apply_to(&mut next[index]);
        self.commit(next, true)?;
        Ok(true)
    }

    /// Delete every synced record; returns how many were removed.
    pub fn remove_synced(&mut self) -> Result<usize, StorageError> {
        let next: Vec<_> = self
            .records
            .iter()
            .filter(|record| record.sync_status != SyncStatus::Synced)
            .cloned()
            .collect();
        let removed = self.records.len() - next.len();
        if removed > 0 {
            self.commit(next, false)?;
        }
        Ok(removed)
    }

    /// Evict a single record regardless of status; returns whether it existed.
    pub fn remove(&mut self, id: &RecordId) -> Result<bool, StorageError> {
        if self.position(id).is_none() {
            return Ok(false);
        }
        let next = self
            .records
            .iter()
            .filter(|record| record.id != *id)
            .cloned()
            .collect();
        self.commit(next, false)?;
        Ok(true)
    }

    /// Reset every exhausted record so automatic runs pick it up again.
    pub fn reset_exhausted(&mut self, max_retries: u32) -> Result<usize, StorageError> {
        let patch = RecordPatch::reset();
        let mut next = self.records.clone();
        let mut reset = 0;
        for record in next
            .iter_mut()
            .filter(|record| record.is_exhausted(max_retries))
        {
            patch.apply_to(record);
            reset += 1;
        }
        if reset > 0 {
            self.commit(next, true)?;
        }
        Ok(reset)
    }

    /// Fetch a record by id
    pub fn get(&self, id: &RecordId) -> Option<&OfflineRecord> {
        self.records.iter().find(|record| record.id == *id)
    }

    /// All records, oldest first
    pub fn records(&self) -> &[OfflineRecord] {
        &self.records
    }

    /// All records, most recent first (display order)
    pub fn list(&self) -> Vec<OfflineRecord> {
        self.records.iter().rev().cloned().collect()
    }

    /// Snapshot of records an automatic run should attempt, oldest first
    pub fn retry_eligible(&self, max_retries: u32) -> Vec<OfflineRecord> {
        self.records
            .iter()
            .filter(|record| record.is_retry_eligible(max_retries))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialized size of the full collection in bytes
    pub const fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub const fn storage_limit(&self) -> usize {
        self.storage_limit
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id == *id)
    }

    /// Persist `next` and only then swap it in. Removals skip the quota
    /// check so an over-quota queue can always shrink.
    fn commit(
        &mut self,
        next: Vec<OfflineRecord>,
        enforce_quota: bool,
    ) -> Result<(), StorageError> {
        let serialized = serialize_collection(RECORDS_KEY, &next)?;
        if enforce_quota && serialized.len() > self.storage_limit {
            tracing::warn!(
                "Rejecting queue write: {} bytes exceeds quota of {} bytes",
                serialized.len(),
                self.storage_limit
            );
            return Err(StorageError::QuotaExceeded {
                required: serialized.len(),
                limit: self.storage_limit,
            });
        }

        self.backend.save(RECORDS_KEY, &serialized)?;
        self.size_bytes = serialized.len();
        self.records = next;
        Ok(())
    }
}

/// Load a JSON array stored under `key`, treating corrupt data as empty.
pub(crate) fn load_collection<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> Result<Vec<T>, StorageError> {
    let Some(raw) = backend.load(key)? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str(&raw) {
        Ok(items) => Ok(items),
        Err(error) => {
            tracing::warn!("Discarding unparsable data stored under '{}': {}", key, error);
            Ok(Vec::new())
        }
    }
}

pub(crate) fn serialize_collection<T: Serialize>(
    key: &str,
    items: &[T],
) -> Result<String, StorageError> {
    serde_json::to_string(items).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn memory_store(limit: usize) -> (Arc<MemoryBackend>, RecordStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::open(backend.clone(), limit).unwrap();
        (backend, store)
    }

    fn record(action: &str) -> OfflineRecord {
        OfflineRecord::new("attendance", action, json!({"employee_id": 12}))
    }

    #[test]
    fn append_persists_and_resets_state() {
        let (backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);

        let mut queued = record("Clock in");
        queued.retry_count = 5;
        queued.sync_status = SyncStatus::Synced;
        let queued = store.append(queued).unwrap();

        assert_eq!(queued.sync_status, SyncStatus::Pending);
        assert_eq!(queued.retry_count, 0);
        assert_eq!(store.len(), 1);

        let reopened = RecordStore::open(backend, DEFAULT_STORAGE_LIMIT).unwrap();
        assert_eq!(reopened.records(), store.records());
    }

    #[test]
    fn append_over_quota_leaves_collection_unchanged() {
        let (_backend, mut store) = memory_store(1_000);
        store.append(record("Clock in")).unwrap();
        let before = store.records().to_vec();

        let mut large = record("Upload timesheet");
        large.payload = json!({"blob": "x".repeat(2_000)});
        let error = store.append(large).unwrap_err();

        assert!(matches!(error, StorageError::QuotaExceeded { limit: 1_000, .. }));
        assert_eq!(store.records(), before.as_slice());
    }

    #[test]
    fn append_rejected_by_backend_leaves_collection_unchanged() {
        let backend = Arc::new(MemoryBackend::with_capacity(64));
        let mut store = RecordStore::open(backend, DEFAULT_STORAGE_LIMIT).unwrap();

        let error = store.append(record("Clock in")).unwrap_err();
        assert!(matches!(error, StorageError::QuotaExceeded { limit: 64, .. }));
        assert!(store.is_empty());
        assert_eq!(store.size_bytes(), 2);
    }

    #[test]
    fn update_missing_record_is_noop() {
        let (_backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);
        let updated = store
            .update(&RecordId::new(), &RecordPatch::synced(1))
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn synced_records_are_not_mutated() {
        let (_backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);
        let queued = store.append(record("Clock in")).unwrap();

        assert!(store.update(&queued.id, &RecordPatch::synced(10)).unwrap());
        assert!(!store
            .update(&queued.id, &RecordPatch::failed(1, "late failure"))
            .unwrap());

        let stored = store.get(&queued.id).unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.retry_count, 0);
    }

    #[test]
    fn remove_synced_keeps_pending_and_failed() {
        let (_backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);
        let pending = store.append(record("a")).unwrap();
        let failed = store.append(record("b")).unwrap();
        let synced = store.append(record("c")).unwrap();

        store
            .update(&failed.id, &RecordPatch::failed(1, "boom"))
            .unwrap();
        store.update(&synced.id, &RecordPatch::synced(5)).unwrap();

        assert_eq!(store.remove_synced().unwrap(), 1);
        let remaining: Vec<_> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![pending.id, failed.id]);
        assert_eq!(store.remove_synced().unwrap(), 0);
    }

    #[test]
    fn remove_evicts_single_record() {
        let (_backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);
        let first = store.append(record("a")).unwrap();
        store.append(record("b")).unwrap();

        assert!(store.remove(&first.id).unwrap());
        assert!(!store.remove(&first.id).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn size_bytes_tracks_serialized_collection() {
        let (_backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);
        assert_eq!(store.size_bytes(), "[]".len());

        store.append(record("Clock in")).unwrap();
        let expected = serde_json::to_string(store.records()).unwrap().len();
        assert_eq!(store.size_bytes(), expected);
    }

    #[test]
    fn corrupt_stored_data_is_treated_as_empty() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert_raw(RECORDS_KEY, "{not json");

        let store = RecordStore::open(backend, DEFAULT_STORAGE_LIMIT).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn list_is_most_recent_first() {
        let (_backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);
        let first = store.append(record("a")).unwrap();
        let second = store.append(record("b")).unwrap();

        let listed: Vec<_> = store.list().into_iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![second.id, first.id]);
    }

    #[test]
    fn reset_exhausted_only_touches_capped_records() {
        let (_backend, mut store) = memory_store(DEFAULT_STORAGE_LIMIT);
        let exhausted = store.append(record("a")).unwrap();
        let retrying = store.append(record("b")).unwrap();

        store
            .update(&exhausted.id, &RecordPatch::failed(3, "down"))
            .unwrap();
        store
            .update(&retrying.id, &RecordPatch::failed(1, "down"))
            .unwrap();

        assert_eq!(store.reset_exhausted(3).unwrap(), 1);

        let reset = store.get(&exhausted.id).unwrap();
        assert_eq!(reset.retry_count, 0);
        assert_eq!(reset.sync_status, SyncStatus::Pending);
        assert!(reset.last_error.is_none());

        let untouched = store.get(&retrying.id).unwrap();
        assert_eq!(untouched.retry_count, 1);
        assert_eq!(untouched.last_error.as_deref(), Some("down"));
    }
}
