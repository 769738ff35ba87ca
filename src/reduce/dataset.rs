//! Directory driver for the reduction stage: every raw event file in, a
//! reduced twin plus one manifest row out.

use super::EventReducer;
use crate::config::ReduceConfig;
use crate::corpus::{list_event_files, ManifestIndex};
use crate::errors::PipelineError;
use crate::labels::label_for_document;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Manifest record written for one reduced document.
#[derive(Debug, Clone, Serialize)]
pub struct ReduceRecord {
    pub filename: String,
    /// Digest of the bytes written to the reduced file.
    pub sha256: String,
    /// Digest of the raw input bytes.
    pub source_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_level_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_timestamp: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl ReduceRecord {
    /// Hashes from the bytes on both sides; label and timestamps carried
    /// over from the incoming manifest row when one exists. The label is
    /// emitted as a numeric id only when the row normalizes to a canonical
    /// level.
    fn build(filename: &str, out_bytes: &[u8], raw_bytes: &[u8], row: Option<&Value>) -> Self {
        let mut record = Self {
            filename: filename.to_string(),
            sha256: sha256_hex(out_bytes),
            source_sha256: sha256_hex(raw_bytes),
            threat_level_id: None,
            date: None,
            publish_timestamp: None,
            timestamp: None,
        };
        if let Some(row) = row {
            record.threat_level_id =
                label_for_document(Some(row), None).map(|level| level.id().to_string());
            record.date = row.get("date").cloned();
            record.publish_timestamp = row
                .get("publish_timestamp")
                .or_else(|| row.get("published_timestamp"))
                .cloned();
            record.timestamp = row.get("timestamp").cloned();
        }
        record
    }
}

#[derive(Debug, Default)]
pub struct ReduceSummary {
    pub scanned: usize,
    pub written: usize,
    pub skipped: usize,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(data);
    format!("{:x}", h.finalize())
}

/// Reduce every `.json` file under `input_dir` into `output_dir` and write a
/// fresh `manifest.jsonl` next to the reduced documents. Per-file failures
/// (unreadable, unparseable, no `Event`) are warned and skipped; the pass
/// continues.
pub fn reduce_directory(
    input_dir: &Path,
    output_dir: &Path,
    manifest: &ManifestIndex,
    options: ReduceConfig,
) -> Result<ReduceSummary, PipelineError> {
    fs::create_dir_all(output_dir)?;
    let reducer = EventReducer::new(options);
    let filenames = list_event_files(input_dir)?;

    let manifest_path = output_dir.join("manifest.jsonl");
    let mut manifest_out = BufWriter::new(fs::File::create(&manifest_path)?);
    let mut summary = ReduceSummary::default();

    for filename in &filenames {
        summary.scanned += 1;

        let raw_bytes = match fs::read(input_dir.join(filename)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %filename, error = %e, "unreadable, skipping");
                summary.skipped += 1;
                continue;
            }
        };
        let raw: Value = match serde_json::from_slice(&raw_bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(file = %filename, error = %e, "unparseable JSON, skipping");
                summary.skipped += 1;
                continue;
            }
        };
        let Some(reduced) = reducer.reduce(&raw) else {
            warn!(file = %filename, "no Event object, skipping");
            summary.skipped += 1;
            continue;
        };

        let out_bytes = serde_json::to_vec_pretty(&reduced)?;
        fs::write(output_dir.join(filename), &out_bytes)?;

        let record = ReduceRecord::build(filename, &out_bytes, &raw_bytes, manifest.get(filename));
        writeln!(manifest_out, "{}", serde_json::to_string(&record)?)?;
        summary.written += 1;
    }
    manifest_out.flush()?;

    info!(
        scanned = summary.scanned,
        written = summary.written,
        skipped = summary.skipped,
        "reduction pass complete"
    );
    Ok(summary)
}
