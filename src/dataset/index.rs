use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::write_atomic;
use crate::annotate::DatasetRecord;

/// Reads a metadata index, one record per line.
///
/// Later lines for an id replace earlier ones in place. A final line cut
/// short by an interrupted write is dropped with a warning; any other
/// malformed line is an error.
pub fn read_index(path: &Path) -> Result<Vec<DatasetRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading metadata index {}", path.display()))?;
    let terminated = raw.ends_with('\n');
    let lines: Vec<(usize, &str)> = raw
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    let mut records: Vec<DatasetRecord> = Vec::with_capacity(lines.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (i, (n, line)) in lines.iter().enumerate() {
        let record: DatasetRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(err) if i + 1 == lines.len() && !terminated => {
                log::warn!(
                    "{}: dropping truncated final line {} ({})",
                    path.display(),
                    n + 1,
                    err
                );
                break;
            }
            Err(err) => {
                return Err(anyhow!(
                    "{}: line {} is not a valid record: {}",
                    path.display(),
                    n + 1,
                    err
                ))
            }
        };
        match positions.get(&record.id) {
            Some(&pos) => records[pos] = record,
            None => {
                positions.insert(record.id.clone(), records.len());
                records.push(record);
            }
        }
    }
    Ok(records)
}

/// Rewrites the index with one line per id. Returns the surviving record count.
pub fn compact_index(path: &Path) -> Result<usize> {
    let records = read_index(path)?;
    let mut out = String::new();
    for record in &records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())?;
    Ok(records.len())
}
