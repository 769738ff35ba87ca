//! Structured logging setup shared by all pipeline stages.

mod format;

pub use format::StructuredLogger;
