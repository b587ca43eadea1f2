use std::path::Path;

use staffsync_core::{RunOutcome, SyncReport};

use crate::commands::common::{open_engine, open_remote_engine, resolve_record_id};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let engine = open_remote_engine(db_path)?;

    match engine.run().await? {
        RunOutcome::Completed(report) => println!("{}", format_sync_report(&report)),
        RunOutcome::AlreadyRunning => println!("A sync run is already in progress"),
        RunOutcome::Offline => println!("Offline; nothing was sent"),
    }

    let stats = engine.stats().await;
    if stats.exhausted > 0 {
        println!(
            "{} records exhausted their retries. Run `staffsync retry-failed` to try again.",
            stats.exhausted
        );
    }
    if stats.unresolved_conflicts > 0 {
        println!(
            "{} conflicts need a decision. Run `staffsync conflicts list`.",
            stats.unresolved_conflicts
        );
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> String {
    if report.total == 0 {
        return "Nothing to sync".to_string();
    }
    format!(
        "Synced {}/{} records ({} failed, {} conflicts)",
        report.synced, report.total, report.failed, report.conflicts
    )
}

pub async fn run_retry_failed(db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path)?;
    let reset = engine.retry_failed().await?;
    println!("Requeued {reset} records");
    Ok(())
}

pub async fn run_clear_synced(db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path)?;
    let removed = engine.clear_synced().await?;
    println!("Removed {removed} synced records");
    Ok(())
}

pub async fn run_evict(id: &str, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path)?;
    let records = engine.records().await;
    let record_id = resolve_record_id(id, &records)?;

    engine.evict(&record_id).await?;
    println!("Evicted record {record_id}");
    Ok(())
}
