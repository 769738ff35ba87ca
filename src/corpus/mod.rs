//! Corpus assembly: manifest bookkeeping, token-budget filtering, and
//! stratified train/test splitting over reduced event documents.

mod filter;
mod manifest;
mod split;

pub use filter::{CorpusFilter, DocumentMeasure, FilterSummary};
pub use manifest::{write_partition_manifest, ManifestIndex};
pub use split::stratified_split;

use crate::errors::PipelineError;
use crate::labels::ThreatLevel;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// A document filename paired with its normalized label.
pub type LabeledFile = (String, ThreatLevel);

/// Filenames of the event documents directly under `dir`, sorted. Only
/// `.json` files count; subdirectories and sidecars are ignored.
pub(crate) fn list_event_files(dir: &Path) -> Result<Vec<String>, PipelineError> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("input directory {} does not exist", dir.display()),
        )
        .into());
    }

    let mut filenames: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| name.to_ascii_lowercase().ends_with(".json"))
        .collect();
    filenames.sort_unstable();
    Ok(filenames)
}
