use std::path::Path;

use crate::commands::common::{format_record_lines, open_engine, record_to_item, RecordListItem};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path)?;
    let mut records = engine.records().await;
    records.truncate(limit);

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("Queue is empty.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
