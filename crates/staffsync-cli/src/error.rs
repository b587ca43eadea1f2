use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] staffsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("ID cannot be empty")]
    EmptyId,
    #[error("No {kind} found for id/prefix: {query}")]
    NotFound { kind: &'static str, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Payload is not valid JSON: {0}")]
    InvalidPayload(String),
    #[error("`--use merge` requires a merged `--payload`")]
    MissingMergePayload,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Remote is not configured. Run `staffsync config set-remote <url>` or set STAFFSYNC_REMOTE_URL."
    )]
    RemoteNotConfigured,
}
