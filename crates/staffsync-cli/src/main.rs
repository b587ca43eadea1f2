//! staffsync CLI - inspect and drive the offline write queue
//!
//! Queue writes while offline, push them when the remote is reachable and
//! settle the conflicts the remote reports.

mod cli;
mod commands;
mod config;
mod error;
mod remote;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::conflicts::run_conflicts;
use crate::commands::list::run_list;
use crate::commands::stats::run_stats;
use crate::commands::sync::{run_clear_synced, run_evict, run_retry_failed, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let db_path = resolve_db_path(cli.db_path)?;
    tracing::debug!("Using queue database at {}", db_path.display());

    match cli.command {
        Commands::Add {
            entity_type,
            action,
            payload,
        } => run_add(&entity_type, &action, payload.as_deref(), &db_path).await,
        Commands::List { limit, json } => run_list(limit, json, &db_path).await,
        Commands::Stats { json } => run_stats(json, &db_path).await,
        Commands::Sync => run_sync(&db_path).await,
        Commands::RetryFailed => run_retry_failed(&db_path).await,
        Commands::ClearSynced => run_clear_synced(&db_path).await,
        Commands::Evict { id } => run_evict(&id, &db_path).await,
        Commands::Conflicts { command } => run_conflicts(command, &db_path).await,
        Commands::Config { command } => run_config(command),
    }
}

fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "staffsync=info".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
