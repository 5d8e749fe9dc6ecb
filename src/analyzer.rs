//! Content analysis stage.
//!
//! Sends the fetched text to the completion model with a low-randomness
//! analysis prompt and parses the JSON result into `ContentAnalysis`.
//! Failure policy: an analysis failure degrades quality, not correctness,
//! so this stage NEVER propagates an error — any invocation or parse
//! failure becomes the deterministic fallback analysis, and even a
//! successful parse goes through field-level repair.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::config::{Calibration, Prompts};
use crate::domain::{Complexity, ContentAnalysis, ContentKind};
use crate::openai::{ChatMessage, CompletionModel, CompletionParams};
use crate::util::{fill_template, reading_minutes, trunc_for_log};

// Consistency over creativity, and a short structured object back.
const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 500;

const MAX_MAIN_TOPICS: usize = 5;
const MAX_KEY_TERMS: usize = 10;
const FALLBACK_TOPIC: &str = "general topic";
const FALLBACK_TERM: &str = "fundamentals";

/// Permissive decode target: every field optional and untyped, repaired
/// afterwards. Partial decode success is never trusted as "safe".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnalysis {
  #[serde(rename = "mainTopics", alias = "main_topics")]
  main_topics: Value,
  #[serde(rename = "keyTerms", alias = "key_terms")]
  key_terms: Value,
  complexity: Value,
  #[serde(rename = "contentType", alias = "content_kind")]
  content_kind: Value,
  #[serde(rename = "estimatedReadingTime", alias = "estimated_reading_minutes")]
  estimated_reading_minutes: Value,
}

pub struct ContentAnalyzer {
  model: Arc<dyn CompletionModel>,
  prompts: Prompts,
  calibration: Calibration,
}

impl ContentAnalyzer {
  pub fn new(model: Arc<dyn CompletionModel>, prompts: Prompts, calibration: Calibration) -> Self {
    Self { model, prompts, calibration }
  }

  /// Analyze raw content. Infallible by contract.
  #[instrument(level = "info", skip(self, content), fields(content_len = content.len()))]
  pub async fn analyze(&self, content: &str) -> ContentAnalysis {
    let user = fill_template(&self.prompts.analysis_user_template, &[("content", content)]);
    let messages =
      [ChatMessage::system(&self.prompts.analysis_system), ChatMessage::user(&user)];
    let params =
      CompletionParams { temperature: ANALYSIS_TEMPERATURE, max_tokens: ANALYSIS_MAX_TOKENS };

    let text = match self.model.complete(&messages, params).await {
      Ok(t) => t,
      Err(e) => {
        warn!(target: "pipeline", error = %e, "Analysis call failed; using fallback analysis");
        return self.fallback(content);
      }
    };

    match serde_json::from_str::<RawAnalysis>(text.trim()) {
      Ok(raw) => self.repair(raw, content),
      Err(e) => {
        warn!(
          target: "pipeline",
          error = %e,
          raw = %trunc_for_log(&text, 120),
          "Analysis output was not a JSON object; using fallback analysis"
        );
        self.fallback(content)
      }
    }
  }

  /// Field-level repair applied even on a successful parse: truncate arrays
  /// to their max length, replace empty/non-array values with a one-element
  /// placeholder, coerce invalid enum labels to the safe default, and
  /// recompute a missing reading time locally.
  fn repair(&self, raw: RawAnalysis, content: &str) -> ContentAnalysis {
    ContentAnalysis {
      main_topics: string_list(&raw.main_topics, MAX_MAIN_TOPICS, FALLBACK_TOPIC),
      key_terms: string_list(&raw.key_terms, MAX_KEY_TERMS, FALLBACK_TERM),
      complexity: raw
        .complexity
        .as_str()
        .and_then(Complexity::from_label)
        .unwrap_or(Complexity::Beginner),
      content_kind: raw
        .content_kind
        .as_str()
        .and_then(ContentKind::from_label)
        .unwrap_or(ContentKind::Text),
      estimated_reading_minutes: raw
        .estimated_reading_minutes
        .as_u64()
        .filter(|m| *m > 0)
        .map(|m| m as u32)
        .unwrap_or_else(|| reading_minutes(content, self.calibration.words_per_minute)),
    }
  }

  /// The deterministic fallback: fully populated, computed locally.
  fn fallback(&self, content: &str) -> ContentAnalysis {
    ContentAnalysis {
      main_topics: vec![FALLBACK_TOPIC.into()],
      key_terms: vec![FALLBACK_TERM.into()],
      complexity: Complexity::Beginner,
      content_kind: ContentKind::Text,
      estimated_reading_minutes: reading_minutes(content, self.calibration.words_per_minute),
    }
  }
}

fn string_list(value: &Value, max: usize, placeholder: &str) -> Vec<String> {
  let items: Vec<String> = value
    .as_array()
    .map(|arr| {
      arr
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .take(max)
        .collect()
    })
    .unwrap_or_default();
  if items.is_empty() {
    vec![placeholder.to_string()]
  } else {
    items
  }
}
