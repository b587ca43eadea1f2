//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use staffsync_core::util::normalize_text_option;
use staffsync_core::EngineConfig;

const CONFIG_FILE_NAME: &str = "config.json";

/// Overrides the configured remote base URL
pub const REMOTE_URL_ENV: &str = "STAFFSYNC_REMOTE_URL";
/// Bearer token sent to the remote; never written to disk
pub const REMOTE_TOKEN_ENV: &str = "STAFFSYNC_REMOTE_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            engine: EngineConfig::default(),
        }
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("staffsync").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

/// Token from the environment, if any
pub fn remote_token() -> Option<String> {
    normalize_text_option(std::env::var(REMOTE_TOKEN_ENV).ok())
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.engine.normalize();
        config
            .engine
            .validate()
            .map_err(|error| format!("Invalid config at {}: {}", path.display(), error))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.engine.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Engine settings with environment overrides applied
    pub fn effective_engine(&self) -> EngineConfig {
        with_remote_override(
            self.engine.clone(),
            std::env::var(REMOTE_URL_ENV).ok(),
        )
    }
}

pub fn with_remote_override(mut engine: EngineConfig, remote_url: Option<String>) -> EngineConfig {
    if let Some(url) = normalize_text_option(remote_url) {
        engine.remote_base_url = Some(url);
    }
    engine.normalize();
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = CliConfig::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliConfig::default());
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn config_roundtrip_normalizes_remote_url() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        let mut config = CliConfig::default();
        config.engine.remote_base_url = Some(" https://hr.example.com/ ".to_string());
        config.engine.max_retries = 5;

        config.save_to_path(&path).unwrap();
        let loaded = CliConfig::load_from_path(&path).unwrap();
        assert_eq!(
            loaded.engine.remote_base_url.as_deref(),
            Some("https://hr.example.com")
        );
        assert_eq!(loaded.engine.max_retries, 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"engine":{"auto_sync":false}}"#).unwrap();

        let loaded = CliConfig::load_from_path(&path).unwrap();
        assert!(!loaded.engine.auto_sync);
        assert_eq!(loaded.engine.max_retries, 3);
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn invalid_values_are_rejected_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"engine":{"remote_base_url":"hr.example.com"}}"#).unwrap();

        let error = CliConfig::load_from_path(&path).unwrap_err();
        assert!(error.contains("Invalid config"));
    }

    #[test]
    fn remote_override_wins_when_present() {
        let mut engine = EngineConfig::default();
        engine.remote_base_url = Some("https://configured.example.com".to_string());

        let overridden = with_remote_override(
            engine.clone(),
            Some("https://env.example.com/".to_string()),
        );
        assert_eq!(
            overridden.remote_base_url.as_deref(),
            Some("https://env.example.com")
        );

        let untouched = with_remote_override(engine, Some("  ".to_string()));
        assert_eq!(
            untouched.remote_base_url.as_deref(),
            Some("https://configured.example.com")
        );
    }
}
