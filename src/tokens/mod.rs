//! Token budget arithmetic and token counting against a reference tokenizer.

mod budget;
mod counter;

pub use budget::safe_token_threshold;
pub use counter::{TokenCounter, Tokenize};
