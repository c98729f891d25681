use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use salesplan_core::ingest::{ingest_json, ColumnMapping, IngestReport};

/// Reads a JSON records export and maps it with the configured columns.
pub fn read_records(path: &Path, mapping: &ColumnMapping) -> Result<IngestReport> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read records file `{}`", path.display()))?;
    let report = ingest_json(&raw, mapping)
        .with_context(|| format!("could not parse records file `{}`", path.display()))?;
    Ok(report)
}
