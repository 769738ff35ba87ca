//! Pipeline error types. Per-document failures are warned and skipped at the
//! call site; these variants cover the failures that abort a whole run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Context window / overhead combination leaves no room for data tokens.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The reference tokenizer file could not be loaded. Fatal before any
    /// document is touched: every keep/drop decision depends on it.
    #[error("failed to load tokenizer from {path:?}: {reason}")]
    TokenizerLoad { path: PathBuf, reason: String },

    /// The tokenizer rejected a text it was asked to measure.
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    /// A feed index page could not be listed at all.
    #[error("feed index '{url}' unavailable: {reason}")]
    IndexUnavailable { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
