//! Token counting through an on-disk HuggingFace tokenizer.

use crate::errors::PipelineError;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::info;

/// Anything that can measure the token length of a text. The corpus filter
/// takes this seam; tests supply a cheap deterministic implementation.
pub trait Tokenize {
    fn count_tokens(&self, text: &str) -> Result<usize, PipelineError>;
}

/// Counts with a real tokenizer loaded from a `tokenizer.json` file.
#[derive(Debug)]
pub struct TokenCounter {
    tokenizer: Tokenizer,
}

impl TokenCounter {
    /// Load the reference tokenizer. Failure here is fatal to a filtering
    /// run: no keep/drop decision is meaningful without it.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| PipelineError::TokenizerLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "reference tokenizer loaded");
        Ok(Self { tokenizer })
    }
}

impl Tokenize for TokenCounter {
    /// Token count without special tokens; the budget already accounts for
    /// prompt wrapping.
    fn count_tokens(&self, text: &str) -> Result<usize, PipelineError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| PipelineError::Tokenization(e.to_string()))?;
        Ok(encoding.get_ids().len())
    }
}
