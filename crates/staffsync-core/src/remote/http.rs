//! HTTP adapter for the remote write API.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{ApplyOutcome, ConflictVerdict, RemoteWrite, RemoteWriter};
use crate::error::TransientSyncError;
use crate::util::{compact_text, is_http_url, normalize_text_option};

const APPLY_PATH: &str = "/v1/sync/apply";

#[derive(Clone)]
pub struct HttpRemote {
    endpoint: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("endpoint", &self.endpoint)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| format!("failed to build remote HTTP client: {error}"))?;
        Ok(Self {
            endpoint: format!("{base_url}{APPLY_PATH}"),
            bearer_token: None,
            client,
        })
    }

    /// Attach a bearer token to every request
    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = normalize_text_option(token);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct ApplyRequest<'a> {
    #[serde(flatten)]
    write: &'a RemoteWrite,
    force: bool,
}

impl RemoteWriter for HttpRemote {
    async fn apply(
        &self,
        write: &RemoteWrite,
        force: bool,
    ) -> Result<ApplyOutcome, TransientSyncError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&ApplyRequest { write, force });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|error| TransientSyncError::Network(error.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(
            "Remote answered {} for record {}",
            status.as_u16(),
            write.record_id
        );
        interpret_response(status, &body)
    }
}

/// Map a remote response onto the engine contract
fn interpret_response(status: StatusCode, body: &str) -> Result<ApplyOutcome, TransientSyncError> {
    if status.is_success() {
        return Ok(ApplyOutcome::Applied);
    }

    if status == StatusCode::CONFLICT {
        return serde_json::from_str::<ConflictVerdict>(body)
            .map(ApplyOutcome::Conflict)
            .map_err(|error| {
                TransientSyncError::InvalidResponse(format!("unreadable conflict body: {error}"))
            });
    }

    Err(TransientSyncError::Rejected {
        status: status.as_u16(),
        message: parse_api_error(status, body),
    })
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: String) -> Result<String, String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| "remote base URL must not be empty".to_string())?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err("remote base URL must include http:// or https://".to_string())
    }
}
