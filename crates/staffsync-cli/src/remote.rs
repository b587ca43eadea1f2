//! Remote selection for the CLI.

use staffsync_core::remote::{ApplyOutcome, HttpRemote, RemoteWrite, RemoteWriter};
use staffsync_core::{EngineConfig, TransientSyncError};

use crate::error::CliError;

/// The configured remote, or a placeholder that refuses every write
#[derive(Debug)]
pub enum CliRemote {
    Http(HttpRemote),
    Unconfigured,
}

impl CliRemote {
    pub fn from_config(config: &EngineConfig, token: Option<String>) -> Result<Self, CliError> {
        let Some(base_url) = config.remote_base_url.clone() else {
            return Ok(Self::Unconfigured);
        };
        let remote = HttpRemote::new(base_url, config.remote_timeout()).map_err(CliError::Config)?;
        Ok(Self::Http(remote.with_bearer_token(token)))
    }

    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

impl RemoteWriter for CliRemote {
    async fn apply(
        &self,
        write: &RemoteWrite,
        force: bool,
    ) -> Result<ApplyOutcome, TransientSyncError> {
        match self {
            Self::Http(remote) => remote.apply(write, force).await,
            Self::Unconfigured => Err(TransientSyncError::Unavailable(
                "remote URL is not configured".to_string(),
            )),
        }
    }
}
