//! Derived queue statistics shown on the sync dashboard

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::{OfflineRecord, SyncStatus};
use super::sync_conflict::SyncConflict;
use crate::util::local_date_of;

/// Snapshot of queue health. Never persisted; recomputed from the stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_records: usize,
    /// Pending plus failed
    pub pending_sync: usize,
    /// Subset of `pending_sync` whose last attempt failed
    pub failed: usize,
    /// Records automatic runs no longer pick up
    pub exhausted: usize,
    /// Synced records created on the current local day
    pub synced_today: usize,
    /// Most recent successful application (unix ms)
    pub last_sync_time: Option<i64>,
    pub unresolved_conflicts: usize,
    /// Serialized size of the record collection
    pub storage_used: usize,
    pub storage_limit: usize,
}

impl StorageStats {
    /// Derive stats from the current records and conflicts.
    ///
    /// `today` is the device-local calendar day used for `synced_today`.
    pub fn derive(
        records: &[OfflineRecord],
        conflicts: &[SyncConflict],
        storage_used: usize,
        storage_limit: usize,
        max_retries: u32,
        today: NaiveDate,
    ) -> Self {
        let mut stats = Self {
            total_records: records.len(),
            unresolved_conflicts: conflicts.iter().filter(|c| !c.is_resolved()).count(),
            storage_used,
            storage_limit,
            ..Self::default()
        };

        for record in records {
            match record.sync_status {
                SyncStatus::Pending | SyncStatus::Failed => {
                    stats.pending_sync += 1;
                    if record.sync_status == SyncStatus::Failed {
                        stats.failed += 1;
                    }
                    if record.is_exhausted(max_retries) {
                        stats.exhausted += 1;
                    }
                }
                SyncStatus::Synced => {
                    if local_date_of(record.created_at) == Some(today) {
                        stats.synced_today += 1;
                    }
                    let applied_at = record.synced_at.unwrap_or(record.created_at);
                    stats.last_sync_time = stats.last_sync_time.max(Some(applied_at));
                }
            }
        }

        stats
    }

    /// Number of synced records
    pub const fn synced(&self) -> usize {
        self.total_records - self.pending_sync
    }

    /// Fraction of the quota in use, in `[0, 1]` unless the limit was lowered
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_ratio(&self) -> f64 {
        if self.storage_limit == 0 {
            return 0.0;
        }
        self.storage_used as f64 / self.storage_limit as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, RecordPatch, Resolution};
    use chrono::{Duration, Local};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record_created_at(created_at: i64) -> OfflineRecord {
        let mut record = OfflineRecord::new("attendance", "Clock in", json!({}));
        record.created_at = created_at;
        record
    }

    #[test]
    fn derive_counts_each_status() {
        let now = Local::now();
        let today_ms = now.timestamp_millis();
        let two_days_ago_ms = (now - Duration::days(2)).timestamp_millis();

        let pending = record_created_at(today_ms);
        let mut failed = record_created_at(today_ms);
        RecordPatch::failed(1, "timeout").apply_to(&mut failed);
        let mut exhausted = record_created_at(today_ms);
        RecordPatch::failed(3, "timeout").apply_to(&mut exhausted);
        let mut synced_today = record_created_at(today_ms);
        RecordPatch::synced(today_ms + 10).apply_to(&mut synced_today);
        let mut synced_earlier = record_created_at(two_days_ago_ms);
        RecordPatch::synced(two_days_ago_ms + 5).apply_to(&mut synced_earlier);

        let mut resolved = SyncConflict::detected(&pending, ConflictType::Other, "e1", json!({}));
        resolved.resolution = Some(Resolution::UseRemote);
        let open = SyncConflict::detected(&pending, ConflictType::Other, "e1", json!({}));

        let records = vec![pending, failed, exhausted, synced_today, synced_earlier];
        let stats = StorageStats::derive(
            &records,
            &[resolved, open],
            1_024,
            4_096,
            3,
            now.date_naive(),
        );

        assert_eq!(
            stats,
            StorageStats {
                total_records: 5,
                pending_sync: 3,
                failed: 2,
                exhausted: 1,
                synced_today: 1,
                last_sync_time: Some(today_ms + 10),
                unresolved_conflicts: 1,
                storage_used: 1_024,
                storage_limit: 4_096,
            }
        );
        assert_eq!(stats.synced(), 2);
        assert!((stats.usage_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn derive_empty_queue() {
        let stats = StorageStats::derive(&[], &[], 2, 100, 3, Local::now().date_naive());
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.last_sync_time, None);
        assert_eq!(stats.synced(), 0);
    }

    #[test]
    fn last_sync_time_falls_back_to_created_at() {
        let mut synced = record_created_at(500);
        synced.sync_status = SyncStatus::Synced;
        let stats = StorageStats::derive(&[synced], &[], 0, 100, 3, Local::now().date_naive());
        assert_eq!(stats.last_sync_time, Some(500));
    }
}
