use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "staffsync")]
#[command(about = "Queue HR dashboard writes offline and sync them later")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local queue database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a write for later sync
    #[command(alias = "queue")]
    Add {
        /// Domain object tag, e.g. "attendance" or "leave"
        #[arg(long, value_name = "TYPE")]
        entity_type: String,
        /// Human-readable operation label
        #[arg(long)]
        action: String,
        /// JSON payload (defaults to `{}`)
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
    /// List queued records, most recent first
    List {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show queue statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push queued records to the remote
    Sync,
    /// Give records that exhausted their retries another chance
    RetryFailed,
    /// Delete records that already reached the remote
    ClearSynced,
    /// Drop a single record from the queue
    Evict {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Inspect and resolve sync conflicts
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
    /// Show or update configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolveChoice {
    /// Overwrite the remote with the queued payload
    Local,
    /// Keep the remote value and drop the queued write
    Remote,
    /// Overwrite the remote with a merged payload
    Merge,
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List conflicts waiting for a decision
    List {
        /// Include resolved conflicts
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict
    Resolve {
        /// Conflict ID or unique ID prefix
        id: String,
        /// Which side wins
        #[arg(long = "use", value_enum)]
        choice: ResolveChoice,
        /// Merged JSON payload (required with `--use merge`)
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
    /// Delete resolved conflicts
    Archive,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the remote write API base URL
    SetRemote {
        /// Base URL, e.g. <https://hr.example.com>
        url: String,
    },
}
