use staffsync_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config::{default_config_path, CliConfig, REMOTE_TOKEN_ENV, REMOTE_URL_ENV};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => run_config_show(json),
        ConfigCommands::SetRemote { url } => run_config_set_remote(url),
    }
}

pub fn run_config_show(as_json: bool) -> Result<(), CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let engine = config.effective_engine();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&engine)?);
        return Ok(());
    }

    let path = default_config_path().map_err(CliError::Config)?;
    println!("Config file:     {}", path.display());
    println!(
        "Remote:          {}",
        engine.remote_base_url.as_deref().unwrap_or("not configured")
    );
    if std::env::var_os(REMOTE_URL_ENV).is_some() {
        println!("                 (overridden by {REMOTE_URL_ENV})");
    }
    println!(
        "Remote token:    {}",
        if std::env::var_os(REMOTE_TOKEN_ENV).is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("Storage limit:   {} bytes", engine.storage_limit_bytes);
    println!("Max retries:     {}", engine.max_retries);
    println!("Settle delay:    {} ms", engine.settle_delay_ms);
    println!("Auto sync:       {}", engine.auto_sync);
    Ok(())
}

pub fn normalize_remote_url(raw: String) -> Result<String, CliError> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| CliError::Config("Remote URL cannot be empty".to_string()))?;
    if !is_http_url(&url) {
        return Err(CliError::Config(
            "Remote URL must include http:// or https://".to_string(),
        ));
    }
    Ok(url.trim_end_matches('/').to_string())
}

pub fn run_config_set_remote(url: String) -> Result<(), CliError> {
    let url = normalize_remote_url(url)?;
    let mut config = CliConfig::load().map_err(CliError::Config)?;
    config.engine.remote_base_url = Some(url.clone());
    let path = config.save().map_err(CliError::Config)?;

    println!("Remote set to {url}");
    println!("Saved config to {}", path.display());
    Ok(())
}
