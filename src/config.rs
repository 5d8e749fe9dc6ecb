//! Pipeline configuration: prompts and calibration constants, loaded from
//! TOML when QUIZFORGE_CONFIG_PATH is set.
//!
//! Prompt text is data, not code: defaults are workable for English course
//! material and can be overridden wholesale. Calibration carries the
//! arbitrary-but-documented heuristics (chars per token, token overhead,
//! reading speed, cost per 1k tokens) so the estimates stay auditable.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub calibration: Calibration,
}

/// Prompts used by the analyzer and the generator. Override them in TOML if
/// you need to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub analysis_system: String,
  pub analysis_user_template: String,
  pub generation_system: String,
  pub generation_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      analysis_system:
        "You are an educational content analyst. Respond ONLY with one strict JSON object, no prose."
          .into(),
      analysis_user_template: concat!(
        "Analyze the learning content below and return JSON with fields: ",
        "mainTopics (array of up to 5 short strings), ",
        "keyTerms (array of up to 10 short strings), ",
        "complexity (one of beginner|intermediate|advanced), ",
        "contentType (one of text|code|mixed), ",
        "estimatedReadingTime (whole minutes, integer).\n\nContent:\n{content}"
      )
      .into(),
      generation_system: concat!(
        "You are a quiz author for an e-learning platform. ",
        "Respond ONLY with one strict JSON array, no prose before or after it."
      )
      .into(),
      generation_user_template: concat!(
        "Create exactly {count} quiz questions from the content below.\n",
        "Allowed question types: {kinds}. Target difficulty: {difficulty}.{focus}\n",
        "Main topics: {topics}. Key terms: {key_terms}.\n\n",
        "Each array element must be an object: {\"question\": string, \"type\": string, ",
        "\"difficulty\": string, \"points\": integer, ",
        "\"options\": [{\"text\": string, \"isCorrect\": boolean}] (MULTIPLE_CHOICE only, ",
        "exactly one option correct), ",
        "\"minWords\" and \"maxWords\" (ESSAY only, integers), ",
        "\"reasoning\": one sentence on the pedagogical value.\n\n",
        "Content:\n{content}"
      )
      .into(),
    }
  }
}

/// Named heuristic constants. These are calibration, not business logic.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Calibration {
  /// Rough chars-per-token divisor for the token estimate.
  pub chars_per_token: u32,
  /// Fixed token overhead modelling prompt + response framing.
  pub token_overhead: u32,
  /// Reading speed for the local reading-time heuristic.
  pub words_per_minute: u32,
  /// USD per 1000 tokens for the estimated-cost aggregate.
  pub cost_per_1k_tokens: f64,
}

impl Default for Calibration {
  fn default() -> Self {
    Self { chars_per_token: 4, token_overhead: 500, words_per_minute: 200, cost_per_1k_tokens: 0.002 }
  }
}

/// Attempt to load `PipelineConfig` from QUIZFORGE_CONFIG_PATH. On any
/// parsing/IO error the defaults are used; the pipeline never refuses to
/// start over a bad config file.
pub fn load_config_from_env() -> PipelineConfig {
  let Some(path) = std::env::var("QUIZFORGE_CONFIG_PATH").ok() else {
    return PipelineConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<PipelineConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quizforge", %path, "Loaded pipeline config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "quizforge", %path, error = %e, "Failed to parse TOML config; using defaults");
        PipelineConfig::default()
      }
    },
    Err(e) => {
      error!(target: "quizforge", %path, error = %e, "Failed to read TOML config file; using defaults");
      PipelineConfig::default()
    }
  }
}
