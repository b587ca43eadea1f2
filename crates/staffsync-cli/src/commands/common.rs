use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use staffsync_core::store::SqliteBackend;
use staffsync_core::{
    ConflictId, OfflineRecord, RecordId, StorageStats, SyncConflict, SyncEngine, SyncState,
};

use crate::config::{remote_token, CliConfig};
use crate::error::CliError;
use crate::remote::CliRemote;

pub type CliEngine = SyncEngine<CliRemote>;

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub entity_type: String,
    pub action: String,
    pub status: String,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub created_at_iso: String,
    pub relative_time: String,
    pub synced_at: Option<i64>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub id: String,
    pub record_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub conflict_type: String,
    pub detected_at: i64,
    pub detected_at_iso: String,
    pub resolution: Option<String>,
    pub local_data: serde_json::Value,
    pub remote_data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub state: SyncState,
    #[serde(flatten)]
    pub stats: StorageStats,
}

pub fn open_engine(db_path: &Path) -> Result<CliEngine, CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?.effective_engine();
    let remote = CliRemote::from_config(&config, remote_token())?;
    let backend = SqliteBackend::open(db_path)?;
    Ok(SyncEngine::new(Arc::new(backend), remote, config)?)
}

/// Open the engine for a command that talks to the remote
pub fn open_remote_engine(db_path: &Path) -> Result<CliEngine, CliError> {
    let engine = open_engine(db_path)?;
    if engine.remote().is_configured() {
        Ok(engine)
    } else {
        Err(CliError::RemoteNotConfigured)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("STAFFSYNC_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("staffsync").join("queue.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn parse_payload(raw: Option<&str>) -> Result<serde_json::Value, CliError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(serde_json::json!({})),
        Some(raw) => {
            serde_json::from_str(raw).map_err(|error| CliError::InvalidPayload(error.to_string()))
        }
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find the single id equal to, or starting with, `query`
pub fn match_id_prefix(
    query: &str,
    ids: &[String],
    kind: &'static str,
) -> Result<usize, CliError> {
    let query = normalize_identifier(query)?;
    if let Some(exact) = ids.iter().position(|id| *id == query) {
        return Ok(exact);
    }

    let matches = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| id.starts_with(&query))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Err(CliError::NotFound { kind, query }),
        [only] => Ok(*only),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|index| short_id(&ids[*index]))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn resolve_record_id(query: &str, records: &[OfflineRecord]) -> Result<RecordId, CliError> {
    let ids = records
        .iter()
        .map(|record| record.id.to_string())
        .collect::<Vec<_>>();
    let index = match_id_prefix(query, &ids, "record")?;
    Ok(records[index].id)
}

pub fn resolve_conflict_id(
    query: &str,
    conflicts: &[SyncConflict],
) -> Result<ConflictId, CliError> {
    let ids = conflicts
        .iter()
        .map(|conflict| conflict.id.to_string())
        .collect::<Vec<_>>();
    let index = match_id_prefix(query, &ids, "conflict")?;
    Ok(conflicts[index].id)
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_record_lines(records: &[OfflineRecord]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            let short_id = short_id(&record.id.to_string());
            let label = preview(&format!("{}: {}", record.entity_type, record.action), 40);
            let status = record.sync_status.as_str();
            let relative_time = format_relative_time(record.created_at, now_ms);

            match &record.last_error {
                Some(error) => format!(
                    "{short_id:<13}  {label:<40}  {status:<7}  {relative_time:<10}  retries={} error={}",
                    record.retry_count,
                    preview(error, 60)
                ),
                None => format!("{short_id:<13}  {label:<40}  {status:<7}  {relative_time}"),
            }
        })
        .collect()
}

pub fn record_to_item(record: &OfflineRecord) -> RecordListItem {
    let now_ms = Utc::now().timestamp_millis();
    RecordListItem {
        id: record.id.to_string(),
        entity_type: record.entity_type.clone(),
        action: record.action.clone(),
        status: record.sync_status.to_string(),
        retry_count: record.retry_count,
        last_error: record.last_error.clone(),
        created_at: record.created_at,
        created_at_iso: format_sync_timestamp(record.created_at),
        relative_time: format_relative_time(record.created_at, now_ms),
        synced_at: record.synced_at,
        payload: record.payload.clone(),
    }
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let resolution = conflict
                .resolution
                .map_or("open", |resolution| resolution.as_str());
            format!(
                "{}  {}  {:<16}  {:<10}  {}: {}  entity={}",
                short_id(&conflict.id.to_string()),
                format_sync_timestamp(conflict.detected_at),
                conflict.conflict_type.as_str(),
                resolution,
                conflict.entity_type,
                conflict.action,
                conflict.entity_id
            )
        })
        .collect()
}

pub fn conflict_to_item(conflict: &SyncConflict) -> ConflictItem {
    ConflictItem {
        id: conflict.id.to_string(),
        record_id: conflict.record_id.to_string(),
        entity_type: conflict.entity_type.clone(),
        entity_id: conflict.entity_id.clone(),
        action: conflict.action.clone(),
        conflict_type: conflict.conflict_type.as_str().to_string(),
        detected_at: conflict.detected_at,
        detected_at_iso: format_sync_timestamp(conflict.detected_at),
        resolution: conflict.resolution.map(|resolution| resolution.to_string()),
        local_data: conflict.local_data.clone(),
        remote_data: conflict.remote_data.clone(),
    }
}

pub fn format_stats_lines(stats: &StorageStats, state: SyncState) -> Vec<String> {
    let last_sync = stats
        .last_sync_time
        .map_or_else(|| "never".to_string(), format_sync_timestamp);

    vec![
        format!("State:           {}", format_state(state)),
        format!("Records:         {}", stats.total_records),
        format!(
            "Pending sync:    {} ({} failed, {} exhausted)",
            stats.pending_sync, stats.failed, stats.exhausted
        ),
        format!("Synced today:    {}", stats.synced_today),
        format!("Last sync:       {last_sync}"),
        format!("Open conflicts:  {}", stats.unresolved_conflicts),
        format!(
            "Storage:         {} of {} ({:.1}%)",
            format_bytes(stats.storage_used),
            format_bytes(stats.storage_limit),
            stats.usage_ratio() * 100.0
        ),
    ]
}

pub const fn format_state(state: SyncState) -> &'static str {
    match state {
        SyncState::Offline => "offline",
        SyncState::Syncing => "syncing",
        SyncState::Synced => "synced",
        SyncState::Pending => "pending",
        SyncState::Error => "needs attention",
    }
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let value = bytes as f64;
    if value >= MIB {
        format!("{:.1} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
