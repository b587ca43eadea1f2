use std::path::Path;

use crate::commands::common::{format_stats_lines, open_engine, StatsReport};
use crate::error::CliError;

pub async fn run_stats(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path)?;
    let stats = engine.stats().await;
    let state = engine.state().await;

    if as_json {
        let report = StatsReport { state, stats };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_stats_lines(&stats, state) {
            println!("{line}");
        }
    }

    Ok(())
}
