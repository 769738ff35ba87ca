//! Token-budget corpus filtering with optional stratified splitting.
//!
//! The filter classifies reduced documents; it never mutates them. Kept
//! documents are copied into a `filtered_json` tree with rendered Markdown
//! twins in a parallel `filtered_md` tree, each partition carrying its own
//! manifest.

use super::manifest::{write_partition_manifest, ManifestIndex};
use super::{list_event_files, stratified_split, LabeledFile};
use crate::config::SplitConfig;
use crate::errors::PipelineError;
use crate::labels::{label_for_document, ThreatLevel};
use crate::render::render_markdown;
use crate::tokens::Tokenize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Per-document token measurement, recorded for every labeled candidate
/// whether or not it survives the threshold.
#[derive(Debug, Clone)]
pub struct DocumentMeasure {
    pub filename: String,
    pub label: ThreatLevel,
    pub token_count: usize,
}

/// Outcome of one filtering pass.
#[derive(Debug, Default)]
pub struct FilterSummary {
    pub scanned: usize,
    pub unlabeled: usize,
    /// Labeled documents before token filtering, with their counts.
    pub candidates: Vec<DocumentMeasure>,
    /// Labeled documents at or under the threshold.
    pub kept: Vec<LabeledFile>,
    pub train: Vec<LabeledFile>,
    pub test: Vec<LabeledFile>,
}

pub struct CorpusFilter<'a> {
    tokenizer: &'a dyn Tokenize,
    threshold: usize,
    split: SplitConfig,
}

impl<'a> CorpusFilter<'a> {
    pub fn new(tokenizer: &'a dyn Tokenize, threshold: usize, split: SplitConfig) -> Self {
        Self {
            tokenizer,
            threshold,
            split,
        }
    }

    /// Scan, label, and measure every document under `input_dir`. No side
    /// effects beyond reading; unparseable files are warned and skipped,
    /// unlabeled ones silently excluded.
    pub fn evaluate(&self, input_dir: &Path) -> Result<FilterSummary, PipelineError> {
        let manifest = ManifestIndex::load(&input_dir.join("manifest.jsonl"));
        let filenames = list_event_files(input_dir)?;
        let mut summary = FilterSummary::default();

        for filename in &filenames {
            summary.scanned += 1;

            let text = match fs::read_to_string(input_dir.join(filename)) {
                Ok(t) => t,
                Err(e) => {
                    warn!(file = %filename, error = %e, "unreadable, skipping");
                    continue;
                }
            };
            let document: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    warn!(file = %filename, error = %e, "corrupted JSON, skipping");
                    continue;
                }
            };

            let Some(label) = label_for_document(manifest.get(filename), Some(&document)) else {
                // Undefined or missing severity: dropped by design, never
                // defaulted into a bucket.
                summary.unlabeled += 1;
                continue;
            };

            // Counts are taken over the compact serialization so whitespace
            // in the stored file never changes the decision.
            let compact = serde_json::to_string(&document)?;
            let token_count = match self.tokenizer.count_tokens(&compact) {
                Ok(n) => n,
                Err(e) => {
                    warn!(file = %filename, error = %e, "tokenization failed, skipping");
                    continue;
                }
            };

            summary.candidates.push(DocumentMeasure {
                filename: filename.clone(),
                label,
                token_count,
            });
            if token_count <= self.threshold {
                summary.kept.push((filename.clone(), label));
            }
        }
        Ok(summary)
    }

    /// Full pass: evaluate, then materialize output trees, Markdown twins,
    /// and manifests. The output root is recreated from scratch.
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<FilterSummary, PipelineError> {
        let mut summary = self.evaluate(input_dir)?;

        ensure_clean_dir(output_dir)?;
        let json_root = output_dir.join("filtered_json");
        let md_root = output_dir.join("filtered_md");
        fs::create_dir_all(&json_root)?;
        fs::create_dir_all(&md_root)?;

        let candidate_labels: Vec<ThreatLevel> =
            summary.candidates.iter().map(|m| m.label).collect();
        let kept_labels: Vec<ThreatLevel> = summary.kept.iter().map(|(_, l)| *l).collect();
        log_label_stats("labeled before token filter", &candidate_labels);
        log_label_stats("kept after token filter", &kept_labels);

        write_partition_manifest(&output_dir.join("filtered_manifest.jsonl"), &summary.kept)?;

        if self.split.enabled {
            let (train, test) =
                stratified_split(&summary.kept, self.split.test_size, self.split.seed);

            for (name, pairs) in [("train", &train), ("test", &test)] {
                let json_dir = json_root.join(name);
                let md_dir = md_root.join(name);
                copy_documents(input_dir, &json_dir, pairs)?;
                write_markdown_twins(input_dir, &md_dir, pairs)?;
                write_partition_manifest(&json_dir.join("manifest.jsonl"), pairs)?;
                write_partition_manifest(&md_dir.join("manifest.jsonl"), pairs)?;

                let labels: Vec<ThreatLevel> = pairs.iter().map(|(_, l)| *l).collect();
                log_label_stats(name, &labels);
            }
            summary.train = train;
            summary.test = test;
        } else {
            copy_documents(input_dir, &json_root, &summary.kept)?;
            write_markdown_twins(input_dir, &md_root, &summary.kept)?;
            write_partition_manifest(&json_root.join("manifest.jsonl"), &summary.kept)?;
            write_partition_manifest(&md_root.join("manifest.jsonl"), &summary.kept)?;
        }

        info!(
            scanned = summary.scanned,
            labeled = summary.candidates.len(),
            unlabeled = summary.unlabeled,
            kept = summary.kept.len(),
            train = summary.train.len(),
            test = summary.test.len(),
            "filtering complete"
        );
        Ok(summary)
    }
}

/// The output root is disposable build product: remove and recreate.
fn ensure_clean_dir(path: &Path) -> Result<(), PipelineError> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn copy_documents(src: &Path, dst: &Path, pairs: &[LabeledFile]) -> Result<(), PipelineError> {
    fs::create_dir_all(dst)?;
    for (filename, _) in pairs {
        fs::copy(src.join(filename), dst.join(filename))?;
    }
    Ok(())
}

/// `event.json` twins as `event.md`.
fn markdown_name(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) => format!("{}.md", stem),
        None => format!("{}.md", filename),
    }
}

fn write_markdown_twins(src: &Path, dst: &Path, pairs: &[LabeledFile]) -> Result<(), PipelineError> {
    fs::create_dir_all(dst)?;
    for (filename, _) in pairs {
        let parsed: Option<Value> = fs::read_to_string(src.join(filename))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok());
        let Some(document) = parsed else {
            warn!(file = %filename, "could not render markdown twin");
            continue;
        };
        fs::write(dst.join(markdown_name(filename)), render_markdown(&document))?;
    }
    Ok(())
}

fn log_label_stats(set: &str, labels: &[ThreatLevel]) {
    let total = labels.len();
    for level in ThreatLevel::ALL {
        let count = labels.iter().filter(|l| **l == level).count();
        let pct = if total == 0 {
            0.0
        } else {
            100.0 * count as f64 / total as f64
        };
        info!(set, n = total, label = level.name(), count, pct, "label distribution");
    }
}
