//! JSON Lines import of question/answer records.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use qamatch_store::{NewRecord, RecordId, RecordRepository};
use tracing::info;

/// Parse one [`NewRecord`] per non-blank line.
pub fn parse_records(reader: impl BufRead) -> Result<Vec<NewRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: NewRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid record on line {}", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Insert every record in `path` in one transaction.
pub fn import_file(repo: &RecordRepository, path: &Path) -> Result<Vec<RecordId>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let records = parse_records(std::io::BufReader::new(file))?;
    let ids = repo
        .insert_many(&records)
        .context("Failed to insert records")?;
    info!(path = %path.display(), count = ids.len(), "records imported");
    Ok(ids)
}
