//! Error taxonomy for the generation pipeline.
//!
//! Two tiers on purpose: the content analyzer absorbs every failure and
//! returns a fallback analysis, so no analysis variant exists here. Fetch,
//! generation and evaluation failures are loud; the orchestrator converts
//! any of them into one uniformly worded `GenerationFailed` after writing
//! the failure row to the usage log.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
  /// The requested lesson/topic/course does not exist in the content store.
  #[error("{scope} '{id}' not found")]
  NotFound { scope: &'static str, id: String },

  /// The scope exists but its concatenated text is blank after trimming.
  #[error("{scope} '{id}' has no content")]
  EmptyContent { scope: &'static str, id: String },

  /// The completion call itself failed (HTTP error, timeout, bad status).
  #[error("model invocation failed: {0}")]
  InvocationFailed(String),

  /// The model answered, but no question array could be recovered even
  /// after bracket extraction.
  #[error("could not parse a question array from the model output: {0}")]
  ParseFailed(String),

  /// Audit-store read failure surfaced by the statistics path. Writes are
  /// never surfaced; they only warn.
  #[error("usage store error: {0}")]
  Storage(String),

  /// Uniform wrapper the orchestrator returns for any generation-stage
  /// failure, after the failure row has been logged.
  #[error("Failed to generate questions: {0}")]
  GenerationFailed(String),
}
