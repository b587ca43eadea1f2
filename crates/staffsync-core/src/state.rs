//! Summary state shown in the sync status badge.

use serde::Serialize;

use crate::models::StorageStats;

/// Unified sync state derived from connectivity, the running flag and stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    /// Nothing left to send
    Synced,
    /// Writes queued, none failing
    Pending,
    /// Failed writes or open conflicts need attention
    Error,
}

impl SyncState {
    pub fn derive(online: bool, running: bool, stats: &StorageStats) -> Self {
        if !online {
            Self::Offline
        } else if running {
            Self::Syncing
        } else if stats.failed > 0 || stats.unresolved_conflicts > 0 {
            Self::Error
        } else if stats.pending_sync > 0 {
            Self::Pending
        } else {
            Self::Synced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_wins_over_everything() {
        let stats = StorageStats {
            failed: 2,
            pending_sync: 2,
            ..StorageStats::default()
        };
        assert_eq!(SyncState::derive(false, true, &stats), SyncState::Offline);
    }

    #[test]
    fn derive_reflects_queue_health() {
        let clean = StorageStats::default();
        assert_eq!(SyncState::derive(true, false, &clean), SyncState::Synced);
        assert_eq!(SyncState::derive(true, true, &clean), SyncState::Syncing);

        let queued = StorageStats {
            pending_sync: 1,
            ..StorageStats::default()
        };
        assert_eq!(SyncState::derive(true, false, &queued), SyncState::Pending);

        let conflicted = StorageStats {
            unresolved_conflicts: 1,
            ..StorageStats::default()
        };
        assert_eq!(SyncState::derive(true, false, &conflicted), SyncState::Error);
    }
}
