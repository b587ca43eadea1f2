use std::path::Path;

use crate::commands::common::{open_engine, parse_payload};
use crate::error::CliError;

pub async fn run_add(
    entity_type: &str,
    action: &str,
    payload: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = parse_payload(payload)?;

    let engine = open_engine(db_path)?;
    let record = engine.queue(entity_type.trim(), action.trim(), payload).await?;

    println!("{}", record.id);
    Ok(())
}
