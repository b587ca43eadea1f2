//! Engine configuration.
//!
//! Every field has a default so a partial (or empty) JSON document is a valid
//! configuration. Front-ends load and persist it; the engine only reads it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_STORAGE_LIMIT;
use crate::util::{is_http_url, normalize_text_option};

/// Attempts before a record stops being retried automatically
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Debounce after connectivity comes back
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;
const DEFAULT_EVENT_CAPACITY: usize = 256;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Tunables for the record store, executor and network monitor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Quota for the serialized record collection
    pub storage_limit_bytes: usize,
    /// Retry cap per record
    pub max_retries: u32,
    /// Delay between "back online" and the automatic run
    pub settle_delay_ms: u64,
    /// Run automatically when connectivity returns
    pub auto_sync: bool,
    /// Buffered events per subscriber
    pub event_capacity: usize,
    /// Base URL of the remote write API
    pub remote_base_url: Option<String>,
    /// Per-request timeout for the remote write API
    pub remote_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_limit_bytes: DEFAULT_STORAGE_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            auto_sync: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            remote_base_url: None,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// Trim optional strings and drop trailing slashes from URLs
    pub fn normalize(&mut self) {
        self.remote_base_url = normalize_text_option(self.remote_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.event_capacity = self.event_capacity.max(1);
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_limit_bytes == 0 {
            return Err("storage_limit_bytes must be greater than zero".to_string());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        if let Some(url) = &self.remote_base_url {
            if !is_http_url(url) {
                return Err("remote_base_url must include http:// or https://".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.storage_limit_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.settle_delay(), Duration::from_secs(1));
        assert!(config.auto_sync);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "auto_sync": false, "max_retries": 5 }"#).unwrap();
        assert!(!config.auto_sync);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
    }

    #[test]
    fn normalize_trims_remote_url() {
        let mut config = EngineConfig {
            remote_base_url: Some("  https://hr.example.com/api/ ".to_string()),
            ..EngineConfig::default()
        };
        config.normalize();
        assert_eq!(
            config.remote_base_url.as_deref(),
            Some("https://hr.example.com/api")
        );

        config.remote_base_url = Some("   ".to_string());
        config.normalize();
        assert_eq!(config.remote_base_url, None);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = EngineConfig {
            remote_base_url: Some("hr.example.com".to_string()),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            max_retries: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
