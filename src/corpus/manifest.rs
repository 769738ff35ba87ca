//! JSONL manifests: partition records on the write side, a filename-keyed
//! label index on the read side.

use super::LabeledFile;
use crate::errors::PipelineError;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// One partition manifest row; the label appears as both id and name.
#[derive(Debug, Serialize)]
struct PartitionRow<'a> {
    filename: &'a str,
    threat_level_id: &'static str,
    threat_level_label: &'static str,
}

/// Write one record per pair, one line each, input order preserved.
pub fn write_partition_manifest(path: &Path, pairs: &[LabeledFile]) -> Result<(), PipelineError> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    for (filename, label) in pairs {
        let row = PartitionRow {
            filename,
            threat_level_id: label.id(),
            threat_level_label: label.name(),
        };
        writeln!(out, "{}", serde_json::to_string(&row)?)?;
    }
    out.flush()?;
    Ok(())
}

/// Filename-keyed view of a `manifest.jsonl`. Blank or malformed lines and
/// records without a usable `filename` are skipped; a missing file is just
/// an empty index.
#[derive(Debug, Default)]
pub struct ManifestIndex {
    rows: HashMap<String, Value>,
}

impl ManifestIndex {
    pub fn load(path: &Path) -> Self {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(_) => {
                debug!(path = %path.display(), "no manifest, labels will come from documents");
                return Self::default();
            }
        };

        let mut rows = HashMap::new();
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "manifest read truncated");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(row) = serde_json::from_str::<Value>(trimmed) else {
                continue;
            };
            let filename = row
                .get("filename")
                .and_then(Value::as_str)
                .filter(|f| !f.is_empty())
                .map(str::to_string);
            if let Some(filename) = filename {
                rows.insert(filename, row);
            }
        }
        Self { rows }
    }

    pub fn get(&self, filename: &str) -> Option<&Value> {
        self.rows.get(filename)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
