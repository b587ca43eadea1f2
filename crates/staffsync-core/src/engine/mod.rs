//! Offline sync engine.
//!
//! One `SyncEngine` is built per process and shared by reference. It owns the
//! record store and conflict log, walks the queue against the remote, and
//! publishes [`SyncEvent`]s for the UI. All store mutations happen inside a
//! short lock that is never held across a remote call.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use chrono::Local;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::conflict::ConflictLog;
use crate::error::{Error, Result, TransientSyncError};
use crate::events::{EventBus, SyncEvent};
use crate::models::{
    ConflictId, OfflineRecord, RecordId, RecordPatch, Resolution, StorageStats, SyncConflict,
    SyncStatus,
};
use crate::network::{NetworkMonitor, Transition};
use crate::remote::{ApplyOutcome, ConflictVerdict, RemoteWrite, RemoteWriter};
use crate::state::SyncState;
use crate::store::{RecordStore, StorageBackend};
use crate::util::unix_millis_now;


/// Aggregate result of one run over its snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records in the snapshot
    pub total: usize,
    pub synced: usize,
    pub failed: usize,
    /// Newly detected conflicts; a record whose open conflict is reported
    /// again is not counted
    pub conflicts: usize,
}

impl SyncReport {
    pub const fn all_synced(&self) -> bool {
        self.synced == self.total
    }
}

/// What `run()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run is in flight; nothing was touched
    AlreadyRunning,
    /// The monitor reports offline; nothing was touched
    Offline,
    Completed(SyncReport),
}

/// User choice for settling a conflict
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveAction {
    /// Force-write the queued payload
    UseLocal,
    /// Keep the remote value and drop the queued write
    UseRemote,
    /// Force-write a caller-supplied merged payload
    Merge(serde_json::Value),
}

impl ResolveAction {
    pub const fn resolution(&self) -> Resolution {
        match self {
            Self::UseLocal => Resolution::UseLocal,
            Self::UseRemote => Resolution::UseRemote,
            Self::Merge(_) => Resolution::Merge,
        }
    }
}

/// What `resolve()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved(Resolution),
    /// Already settled earlier; no side effects
    AlreadyResolved,
    /// Another resolve for the same conflict is still writing
    InProgress,
    /// The record had already reached the remote; the conflict was closed
    /// without another write
    RecordAlreadySynced,
}

struct LocalState {
    records: RecordStore,
    conflicts: ConflictLog,
}

pub struct SyncEngine<R> {
    config: EngineConfig,
    local: Mutex<LocalState>,
    remote: R,
    network: NetworkMonitor,
    events: EventBus,
    running: AtomicBool,
    progress: watch::Sender<Option<f64>>,
    resolving: std::sync::Mutex<HashSet<ConflictId>>,
}

impl<R: RemoteWriter> SyncEngine<R> {
    /// Load the queue and conflict log from `backend`
    pub fn new(backend: Arc<dyn StorageBackend>, remote: R, config: EngineConfig) -> Result<Self> {
        let records = RecordStore::open(Arc::clone(&backend), config.storage_limit_bytes)?;
        let conflicts = ConflictLog::open(backend)?;
        let events = EventBus::new(config.event_capacity);
        let network = NetworkMonitor::new(true, events.clone());
        let (progress, _) = watch::channel(None);

        tracing::info!(
            "Sync engine ready: {} queued records, {} open conflicts",
            records.len(),
            conflicts.unresolved().len()
        );

        Ok(Self {
            config,
            local: Mutex::new(LocalState { records, conflicts }),
            remote,
            network,
            events,
            running: AtomicBool::new(false),
            progress,
            resolving: std::sync::Mutex::new(HashSet::new()),
        })
    }

    // ========== Queue ==========

    /// Queue an offline write. Fails with a storage error (and queues
    /// nothing) when the write does not fit.
    pub async fn queue(
        &self,
        entity_type: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<OfflineRecord> {
        let entity_type = entity_type.into();
        if entity_type.trim().is_empty() {
            return Err(Error::InvalidInput(
                "entity type must not be empty".to_string(),
            ));
        }

        let record = {
            let mut local = self.local.lock().await;
            local
                .records
                .append(OfflineRecord::new(entity_type, action, payload))?
        };

        tracing::debug!("Queued {} record {}", record.entity_type, record.id);
        self.events.emit(SyncEvent::RecordQueued {
            record_id: record.id,
            entity_type: record.entity_type.clone(),
        });
        Ok(record)
    }

    /// Delete every synced record
    pub async fn clear_synced(&self) -> Result<usize> {
        let removed = self.local.lock().await.records.remove_synced()?;
        tracing::info!("Cleared {} synced records", removed);
        Ok(removed)
    }

    /// Drop one record, e.g. to free quota
    pub async fn evict(&self, id: &RecordId) -> Result<bool> {
        let removed = self.local.lock().await.records.remove(id)?;
        if removed {
            tracing::info!("Evicted record {}", id);
        }
        Ok(removed)
    }

    /// Manual "retry failed": give exhausted records a fresh retry budget
    pub async fn retry_failed(&self) -> Result<usize> {
        let reset = self
            .local
            .lock()
            .await
            .records
            .reset_exhausted(self.config.max_retries)?;
        tracing::info!("Reset {} exhausted records", reset);
        Ok(reset)
    }

    // ========== Executor ==========

    /// Apply the queued writes, oldest first.
    ///
    /// Declines immediately when offline or when another run is in flight.
    /// Records queued while running are left for the next run.
    pub async fn run(&self) -> Result<RunOutcome> {
        if !self.network.is_online() {
            tracing::debug!("Skipping sync run while offline");
            return Ok(RunOutcome::Offline);
        }
        let Some(_guard) = RunGuard::acquire(&self.running, &self.progress) else {
            tracing::debug!("Sync run already in progress");
            return Ok(RunOutcome::AlreadyRunning);
        };

        let batch = self
            .local
            .lock()
            .await
            .records
            .retry_eligible(self.config.max_retries);

        let mut report = SyncReport {
            total: batch.len(),
            ..SyncReport::default()
        };
        if batch.is_empty() {
            tracing::debug!("Nothing to sync");
            self.events.emit(SyncEvent::SyncCompleted(report));
            return Ok(RunOutcome::Completed(report));
        }

        tracing::info!("Syncing {} queued records", batch.len());
        self.progress.send_replace(Some(0.0));

        for (index, record) in batch.iter().enumerate() {
            self.process(record, &mut report).await;

            let processed = index + 1;
            #[allow(clippy::cast_precision_loss)]
            let fraction = processed as f64 / batch.len() as f64;
            self.progress.send_replace(Some(fraction));
            self.events.emit(SyncEvent::SyncProgress {
                processed,
                total: batch.len(),
            });
        }

        tracing::info!(
            "Sync run finished: {} synced, {} failed, {} conflicts",
            report.synced,
            report.failed,
            report.conflicts
        );
        self.events.emit(SyncEvent::SyncCompleted(report));
        Ok(RunOutcome::Completed(report))
    }

    async fn process(&self, record: &OfflineRecord, report: &mut SyncReport) {
        let write = RemoteWrite::from_record(record);
        let outcome = self.remote.apply(&write, false).await;

        let mut local = self.local.lock().await;
        let Some(current) = local.records.get(&record.id).cloned() else {
            tracing::debug!("Record {} was removed during the run", record.id);
            return;
        };
        if current.sync_status == SyncStatus::Synced {
            return;
        }

        match outcome {
            Ok(ApplyOutcome::Applied) => {
                let now = unix_millis_now();
                match local.records.update(&current.id, &RecordPatch::synced(now)) {
                    Ok(_) => {
                        tracing::debug!("Synced record {}", current.id);
                        report.synced += 1;
                        self.close_superseded_conflict(&mut local, &current.id, now);
                    }
                    Err(error) => {
                        tracing::warn!("Applied record {} but could not persist it: {}", current.id, error);
                        report.failed += 1;
                    }
                }
            }
            Ok(ApplyOutcome::Conflict(verdict)) => {
                if self.record_conflict(&mut local, &current, verdict) {
                    report.conflicts += 1;
                }
            }
            Err(error) => {
                report.failed += 1;
                let retry_count = current.retry_count.saturating_add(1);
                tracing::warn!(
                    "Sync attempt {}/{} failed for record {}: {}",
                    retry_count,
                    self.config.max_retries,
                    current.id,
                    error
                );
                if let Err(storage_error) = local.records.update(
                    &current.id,
                    &RecordPatch::failed(retry_count, error.to_string()),
                ) {
                    tracing::warn!(
                        "Could not persist failure for record {}: {}",
                        current.id,
                        storage_error
                    );
                }
            }
        }
    }

    /// A queued write the remote later accepted settles its open conflict
    /// in favour of the local payload.
    fn close_superseded_conflict(&self, local: &mut LocalState, record_id: &RecordId, now: i64) {
        let Some(conflict_id) = local
            .conflicts
            .unresolved_for_record(record_id)
            .map(|conflict| conflict.id)
        else {
            return;
        };

        match local
            .conflicts
            .mark_resolved(&conflict_id, Resolution::UseLocal, now)
        {
            Ok(true) => {
                tracing::info!(
                    "Closed conflict {} after record {} was applied",
                    conflict_id,
                    record_id
                );
                self.events.emit(SyncEvent::ConflictResolved {
                    conflict_id,
                    resolution: Resolution::UseLocal,
                });
            }
            Ok(false) => {}
            Err(error) => {
                tracing::warn!("Could not close conflict {}: {}", conflict_id, error);
            }
        }
    }

    /// Returns whether a new conflict was stored
    fn record_conflict(
        &self,
        local: &mut LocalState,
        record: &OfflineRecord,
        verdict: ConflictVerdict,
    ) -> bool {
        if record.sync_status == SyncStatus::Failed {
            if let Err(error) = local.records.update(&record.id, &RecordPatch::pending()) {
                tracing::warn!("Could not requeue record {}: {}", record.id, error);
            }
        }

        if local.conflicts.unresolved_for_record(&record.id).is_some() {
            tracing::debug!("Record {} already has an open conflict", record.id);
            return false;
        }

        let conflict = SyncConflict::detected(
            record,
            verdict.conflict_type,
            verdict.entity_id,
            verdict.remote,
        );
        let conflict_id = conflict.id;
        match local.conflicts.insert(conflict) {
            Ok(()) => {
                tracing::warn!(
                    "Conflict {} detected for {} record {}",
                    conflict_id,
                    record.entity_type,
                    record.id
                );
                self.events.emit(SyncEvent::ConflictDetected {
                    conflict_id,
                    record_id: record.id,
                    entity_type: record.entity_type.clone(),
                });
                true
            }
            Err(error) => {
                tracing::warn!("Could not store conflict for record {}: {}", record.id, error);
                false
            }
        }
    }

    // ========== Conflicts ==========

    /// Settle a conflict.
    ///
    /// Resolving an already-resolved conflict is a successful no-op. If the
    /// forced write fails the conflict stays open and the record pending.
    /// A conflict whose record is already synced is closed without writing.
    pub async fn resolve(
        &self,
        conflict_id: &ConflictId,
        action: ResolveAction,
    ) -> Result<ResolveOutcome> {
        if self.conflict(conflict_id).await?.is_resolved() {
            return Ok(ResolveOutcome::AlreadyResolved);
        }
        let Some(_claim) = ResolveClaim::acquire(&self.resolving, *conflict_id) else {
            return Ok(ResolveOutcome::InProgress);
        };

        let (conflict, record) = {
            let local = self.local.lock().await;
            let conflict = local
                .conflicts
                .get(conflict_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("conflict {conflict_id}")))?;
            let record = local.records.get(&conflict.record_id).cloned();
            (conflict, record)
        };
        if conflict.is_resolved() {
            return Ok(ResolveOutcome::AlreadyResolved);
        }

        let resolution = action.resolution();
        if record
            .as_ref()
            .is_some_and(|r| r.sync_status == SyncStatus::Synced)
        {
            self.local.lock().await.conflicts.mark_resolved(
                conflict_id,
                resolution,
                unix_millis_now(),
            )?;
            tracing::info!(
                "Closed conflict {} without a remote write; its record is already synced",
                conflict_id
            );
            self.events.emit(SyncEvent::ConflictResolved {
                conflict_id: *conflict_id,
                resolution,
            });
            return Ok(ResolveOutcome::RecordAlreadySynced);
        }

        let forced_payload = match action {
            ResolveAction::UseRemote => None,
            ResolveAction::UseLocal => Some(
                record
                    .as_ref()
                    .map_or_else(|| conflict.local_data.clone(), |r| r.payload.clone()),
            ),
            ResolveAction::Merge(payload) => Some(payload),
        };

        if let Some(payload) = forced_payload {
            let write = RemoteWrite {
                record_id: conflict.record_id,
                entity_type: conflict.entity_type.clone(),
                action: conflict.action.clone(),
                payload,
                expected_base_version: record
                    .as_ref()
                    .map_or(conflict.detected_at, |r| r.created_at),
            };
            match self.remote.apply(&write, true).await {
                Ok(ApplyOutcome::Applied) => {}
                Ok(ApplyOutcome::Conflict(_)) => {
                    tracing::warn!("Remote refused forced write for conflict {}", conflict_id);
                    return Err(TransientSyncError::Rejected {
                        status: 409,
                        message: "remote refused a forced write".to_string(),
                    }
                    .into());
                }
                Err(error) => {
                    tracing::warn!("Forced write for conflict {} failed: {}", conflict_id, error);
                    return Err(error.into());
                }
            }
        }

        {
            let now = unix_millis_now();
            let mut local = self.local.lock().await;
            local
                .records
                .update(&conflict.record_id, &RecordPatch::synced(now))?;
            local.conflicts.mark_resolved(conflict_id, resolution, now)?;
        }

        tracing::info!("Resolved conflict {} with {}", conflict_id, resolution);
        self.events.emit(SyncEvent::ConflictResolved {
            conflict_id: *conflict_id,
            resolution,
        });
        Ok(ResolveOutcome::Resolved(resolution))
    }

    /// Drop resolved conflicts from storage
    pub async fn archive_resolved_conflicts(&self) -> Result<usize> {
        Ok(self.local.lock().await.conflicts.archive_resolved()?)
    }

    /// Fetch a conflict by id
    pub async fn conflict(&self, id: &ConflictId) -> Result<SyncConflict> {
        self.local
            .lock()
            .await
            .conflicts
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("conflict {id}")))
    }

    /// Conflicts waiting for a decision, oldest first
    pub async fn unresolved_conflicts(&self) -> Vec<SyncConflict> {
        self.local.lock().await.conflicts.unresolved()
    }

    /// Every stored conflict, oldest first
    pub async fn conflicts(&self) -> Vec<SyncConflict> {
        self.local.lock().await.conflicts.all().to_vec()
    }

    // ========== Read surface ==========

    /// Records, most recent first
    pub async fn records(&self) -> Vec<OfflineRecord> {
        self.local.lock().await.records.list()
    }

    pub async fn record(&self, id: &RecordId) -> Option<OfflineRecord> {
        self.local.lock().await.records.get(id).cloned()
    }

    pub async fn stats(&self) -> StorageStats {
        let local = self.local.lock().await;
        StorageStats::derive(
            local.records.records(),
            local.conflicts.all(),
            local.records.size_bytes(),
            local.records.storage_limit(),
            self.config.max_retries,
            Local::now().date_naive(),
        )
    }

    pub async fn state(&self) -> SyncState {
        let stats = self.stats().await;
        SyncState::derive(self.is_online(), self.is_running(), &stats)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Fraction of the current run processed; `None` when idle
    pub fn progress(&self) -> Option<f64> {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Option<f64>> {
        self.progress.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    pub const fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<R: RemoteWriter + 'static> SyncEngine<R> {
    /// Feed a platform connectivity signal.
    ///
    /// When the link comes back and auto-sync is enabled, schedules a run
    /// after the settle delay and returns its handle. The run is skipped if
    /// the link dropped again in the meantime.
    pub fn set_online(self: &Arc<Self>, online: bool) -> Option<JoinHandle<()>> {
        let transition = self.network.report(online)?;
        if transition != Transition::Restored || !self.config.auto_sync {
            return None;
        }

        let engine = Arc::clone(self);
        let delay = self.config.settle_delay();
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !engine.is_online() {
                tracing::debug!("Connection dropped during settle delay; skipping auto-sync");
                return;
            }
            match engine.run().await {
                Ok(outcome) => tracing::debug!("Auto-sync finished: {:?}", outcome),
                Err(error) => tracing::warn!("Auto-sync failed: {}", error),
            }
        }))
    }
}

/// Holds the single-flight flag; releases it and clears progress on drop
struct RunGuard<'a> {
    running: &'a AtomicBool,
    progress: &'a watch::Sender<Option<f64>>,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool, progress: &'a watch::Sender<Option<f64>>) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running, progress })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.progress.send_replace(None);
        self.running.store(false, Ordering::Release);
    }
}

/// Marks a conflict as being resolved so racing clicks do not double-write
struct ResolveClaim<'a> {
    claims: &'a std::sync::Mutex<HashSet<ConflictId>>,
    id: ConflictId,
}

impl<'a> ResolveClaim<'a> {
    fn acquire(claims: &'a std::sync::Mutex<HashSet<ConflictId>>, id: ConflictId) -> Option<Self> {
        let inserted = claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then_some(Self { claims, id })
    }
}

impl Drop for ResolveClaim<'_> {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
