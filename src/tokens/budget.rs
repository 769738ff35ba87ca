//! Safe token threshold from a context window and its overhead reserves.

use crate::config::OverheadConfig;
use crate::errors::PipelineError;
use tracing::info;

/// Upper bound on tokenized document length for corpus inclusion:
///
/// ```text
/// available       = max_context_length - prompt_overhead - output_buffer
/// variance_buffer = trunc(available * variance_percentage)
/// safe_threshold  = available - variance_buffer
/// ```
///
/// This leaves headroom for prompt wrapping and generation rather than
/// enforcing a hard model limit. A threshold of zero or below means the
/// overhead eats the whole window and the run must not start.
pub fn safe_token_threshold(
    max_context_length: usize,
    overhead: &OverheadConfig,
) -> Result<usize, PipelineError> {
    let available = max_context_length as i64
        - overhead.prompt_overhead as i64
        - overhead.output_buffer as i64;
    let variance_buffer = (available as f64 * overhead.variance_percentage) as i64;
    let threshold = available - variance_buffer;

    info!(
        max_context_length,
        available, variance_buffer, threshold, "token budget"
    );

    if threshold <= 0 {
        return Err(PipelineError::InvalidConfiguration(format!(
            "safe token threshold is {} (context {} minus prompt overhead {}, output buffer {}, \
             variance {:.0}%); no room left for data tokens",
            threshold,
            max_context_length,
            overhead.prompt_overhead,
            overhead.output_buffer,
            overhead.variance_percentage * 100.0
        )));
    }
    Ok(threshold as usize)
}
