//! Pipeline configuration: one JSON file drives all three stages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Feed download stage
    pub fetch: FetchConfig,
    /// Event reduction stage
    pub reduce: ReduceConfig,
    /// Token filtering and splitting stage
    pub filter: FilterConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Feed index pages scanned for event document links
    pub index_urls: Vec<String>,
    /// Parallel download workers
    pub workers: usize,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
    /// Attempts per document before recording an error row
    pub retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceConfig {
    /// Truncate long attribute values to this many characters (0 disables)
    pub truncate_long: usize,
    /// Carry the to_ids flag through reduction
    pub keep_to_ids: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Model context window the kept corpus must fit
    pub max_context_length: usize,
    /// Tokenizer definition used for counting
    pub tokenizer_file: PathBuf,
    /// Context reserved before data tokens
    pub overhead: OverheadConfig,
    /// Stratified train/test split
    pub split: SplitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverheadConfig {
    /// Tokens reserved for the instruction prompt
    pub prompt_overhead: usize,
    /// Tokens reserved for the model response
    pub output_buffer: usize,
    /// Fraction of the remainder held back for tokenizer variance
    pub variance_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub enabled: bool,
    /// Share of each label group routed to test
    pub test_size: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            reduce: ReduceConfig::default(),
            filter: FilterConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            index_urls: vec![
                "https://www.circl.lu/doc/misp/feed-osint/".to_string(),
                "https://www.botvrij.eu/data/feed-osint/".to_string(),
            ],
            workers: 16,
            timeout_secs: 120,
            retries: 3,
        }
    }
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            truncate_long: 512,
            keep_to_ids: true,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_context_length: 8192,
            tokenizer_file: PathBuf::from("tokenizer.json"),
            overhead: OverheadConfig::default(),
            split: SplitConfig::default(),
        }
    }
}

impl Default for OverheadConfig {
    fn default() -> Self {
        Self {
            prompt_overhead: 400,
            output_buffer: 120,
            variance_percentage: 0.10,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            test_size: 0.3,
            seed: 42,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Load from JSON file if present; otherwise return defaults. A file
    /// that exists but does not parse also falls back, with a warning.
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<PipelineConfig>(&data) {
                    Ok(c) => return c,
                    Err(e) => warn!(path = %path.display(), error = %e, "config file ignored"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "config file unreadable"),
            }
        }
        Self::default()
    }
}
