//! feedmill — MISP OSINT feed snapshots into a labeled training corpus.
//!
//! Pipeline stages:
//! - [`fetch`] — Feed index discovery and parallel snapshot download
//! - [`reduce`] — Schema-faithful event reduction with value hygiene
//! - [`labels`] — Threat level normalization shared by every stage
//! - [`tokens`] — Token budget math and tokenizer-backed counting
//! - [`corpus`] — Token filtering, stratified splitting, corpus manifests
//! - [`render`] — Markdown twins of kept documents
//! - [`logging`] — Structured logging

pub mod config;
pub mod corpus;
pub mod errors;
pub mod fetch;
pub mod labels;
pub mod logging;
pub mod reduce;
pub mod render;
pub mod tokens;

pub use config::PipelineConfig;
pub use corpus::{stratified_split, CorpusFilter, ManifestIndex};
pub use errors::PipelineError;
pub use fetch::FeedFetcher;
pub use labels::{label_for_document, ThreatLevel};
pub use logging::StructuredLogger;
pub use reduce::{reduce_directory, EventReducer};
pub use render::render_markdown;
pub use tokens::{safe_token_threshold, TokenCounter, Tokenize};
