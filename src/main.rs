//! feedmill entrypoint: snapshot OSINT feeds, reduce the events to their
//! analyst-relevant core, and filter the result down to a token budget with
//! an optional stratified train/test split.

use clap::{Parser, Subcommand};
use feedmill::{
    config::PipelineConfig,
    corpus::{CorpusFilter, ManifestIndex},
    fetch::FeedFetcher,
    logging::StructuredLogger,
    reduce::reduce_directory,
    tokens::{safe_token_threshold, TokenCounter},
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "feedmill",
    version,
    about = "MISP OSINT feed snapshots into a labeled training corpus"
)]
struct Cli {
    /// Pipeline config file (JSON); missing file means built-in defaults
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Emit ndjson log lines instead of console output
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a feed snapshot and write its download manifest
    Fetch {
        #[arg(long)]
        output_dir: PathBuf,
        /// Parallel download workers
        #[arg(long)]
        workers: Option<usize>,
        /// Per-request timeout (seconds)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Reduce raw events, carrying labels through the stage manifest
    Reduce {
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        /// Truncate long attribute values to N characters (0 disables)
        #[arg(long)]
        truncate_long: Option<usize>,
        /// Drop the to_ids flag from attributes
        #[arg(long)]
        drop_to_ids: bool,
    },
    /// Keep labeled documents that fit the token budget; render Markdown twins
    Filter {
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        /// Model context window
        #[arg(long)]
        max_context_length: Option<usize>,
        /// Tokenizer definition used for counting
        #[arg(long)]
        tokenizer_file: Option<PathBuf>,
        /// Stratified train/test split
        #[arg(long)]
        split: bool,
        /// Share of each label group routed to test
        #[arg(long)]
        test_size: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let mut config = PipelineConfig::load(&cli.config);
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if cli.log_json {
        config.log.json = true;
    }
    StructuredLogger::init(config.log.json, &config.log.level);

    match cli.command {
        Commands::Fetch {
            output_dir,
            workers,
            timeout_secs,
        } => {
            let mut fetch = config.fetch;
            if let Some(workers) = workers {
                fetch.workers = workers;
            }
            if let Some(timeout_secs) = timeout_secs {
                fetch.timeout_secs = timeout_secs;
            }
            info!(
                output = %output_dir.display(),
                workers = fetch.workers,
                "fetch starting"
            );
            FeedFetcher::new(fetch)?.run(&output_dir)?;
        }
        Commands::Reduce {
            input_dir,
            output_dir,
            truncate_long,
            drop_to_ids,
        } => {
            let mut reduce = config.reduce;
            if let Some(truncate_long) = truncate_long {
                reduce.truncate_long = truncate_long;
            }
            if drop_to_ids {
                reduce.keep_to_ids = false;
            }
            info!(
                input = %input_dir.display(),
                output = %output_dir.display(),
                "reduce starting"
            );
            let manifest = ManifestIndex::load(&input_dir.join("manifest.jsonl"));
            reduce_directory(&input_dir, &output_dir, &manifest, reduce)?;
        }
        Commands::Filter {
            input_dir,
            output_dir,
            max_context_length,
            tokenizer_file,
            split,
            test_size,
            seed,
        } => {
            let mut filter = config.filter;
            if let Some(max_context_length) = max_context_length {
                filter.max_context_length = max_context_length;
            }
            if let Some(tokenizer_file) = tokenizer_file {
                filter.tokenizer_file = tokenizer_file;
            }
            if split {
                filter.split.enabled = true;
            }
            if let Some(test_size) = test_size {
                filter.split.test_size = test_size;
            }
            if let Some(seed) = seed {
                filter.split.seed = seed;
            }

            // Tokenizer and budget problems are fatal before any output is
            // touched; a half-built corpus is worse than none.
            let counter = TokenCounter::from_file(&filter.tokenizer_file)?;
            let threshold = safe_token_threshold(filter.max_context_length, &filter.overhead)?;
            info!(
                input = %input_dir.display(),
                output = %output_dir.display(),
                threshold,
                "filter starting"
            );
            CorpusFilter::new(&counter, threshold, filter.split).run(&input_dir, &output_dir)?;
        }
    }

    Ok(())
}
