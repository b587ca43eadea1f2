use std::path::Path;

use staffsync_core::{ResolveAction, ResolveOutcome};

use crate::cli::{ConflictCommands, ResolveChoice};
use crate::commands::common::{
    conflict_to_item, format_conflict_lines, open_engine, open_remote_engine, parse_payload,
    resolve_conflict_id, ConflictItem,
};
use crate::error::CliError;

pub async fn run_conflicts(command: ConflictCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        ConflictCommands::List { all, json } => run_conflicts_list(all, json, db_path).await,
        ConflictCommands::Resolve {
            id,
            choice,
            payload,
        } => run_conflicts_resolve(&id, choice, payload.as_deref(), db_path).await,
        ConflictCommands::Archive => run_conflicts_archive(db_path).await,
    }
}

pub async fn run_conflicts_list(
    include_resolved: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let engine = open_engine(db_path)?;
    let conflicts = if include_resolved {
        engine.conflicts().await
    } else {
        engine.unresolved_conflicts().await
    };

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub fn resolve_action(
    choice: ResolveChoice,
    payload: Option<&str>,
) -> Result<ResolveAction, CliError> {
    match choice {
        ResolveChoice::Local => Ok(ResolveAction::UseLocal),
        ResolveChoice::Remote => Ok(ResolveAction::UseRemote),
        ResolveChoice::Merge => match payload.map(str::trim) {
            None | Some("") => Err(CliError::MissingMergePayload),
            Some(raw) => Ok(ResolveAction::Merge(parse_payload(Some(raw))?)),
        },
    }
}

pub async fn run_conflicts_resolve(
    id: &str,
    choice: ResolveChoice,
    payload: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let action = resolve_action(choice, payload)?;
    let engine = match action {
        ResolveAction::UseRemote => open_engine(db_path)?,
        ResolveAction::UseLocal | ResolveAction::Merge(_) => open_remote_engine(db_path)?,
    };

    let conflicts = engine.conflicts().await;
    let conflict_id = resolve_conflict_id(id, &conflicts)?;

    match engine.resolve(&conflict_id, action).await? {
        ResolveOutcome::Resolved(resolution) => {
            println!("Resolved conflict {conflict_id} with {resolution}");
        }
        ResolveOutcome::AlreadyResolved => println!("Conflict {conflict_id} was already resolved"),
        ResolveOutcome::InProgress => {
            println!("Conflict {conflict_id} is being resolved elsewhere");
        }
        ResolveOutcome::RecordAlreadySynced => {
            println!("Record already reached the remote; closed conflict {conflict_id}");
        }
    }
    Ok(())
}

pub async fn run_conflicts_archive(db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path)?;
    let archived = engine.archive_resolved_conflicts().await?;
    println!("Archived {archived} resolved conflicts");
    Ok(())
}
