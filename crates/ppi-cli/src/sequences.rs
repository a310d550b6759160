use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Loads a two-column identifier/sequence TSV into a lookup table.
///
/// This stands in for the external protein-metadata resolver: training
/// requires every identifier to resolve, while the inference service treats
/// the table as best-effort and falls back to a degraded zero-vector input
/// for identifiers it cannot resolve.
pub fn load_sequence_table<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_ref())
        .with_context(|| format!("failed to open sequence table {:?}", path.as_ref()))?;

    let mut table = HashMap::new();
    for record in reader.records() {
        let record = record.context("malformed row in sequence table")?;
        if record.len() < 2 {
            continue;
        }
        let id = record[0].trim();
        let sequence = record[1].trim();
        if id.is_empty() || sequence.is_empty() {
            continue;
        }
        table.insert(id.to_string(), sequence.to_string());
    }
    log::info!(
        "Loaded {} sequences from {:?}",
        table.len(),
        path.as_ref()
    );
    Ok(table)
}
