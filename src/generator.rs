//! Question generation stage: prompt construction, loud parsing, and the
//! total normalization of the model's untrusted output.
//!
//! Unlike the analyzer, parse failures here PROPAGATE: a caller with zero
//! questions has nothing usable to fall back to. Normalization, on the
//! other hand, never fails — every loosely-shaped raw element is repaired
//! field-by-field into a fully invariant-respecting `GeneratedQuestion`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::config::Prompts;
use crate::domain::{
  difficulty_from_alias, kind_from_alias, points_for_difficulty, AnswerOption, ContentAnalysis,
  Difficulty, GeneratedQuestion, QuestionKind, ResolvedConstraints,
};
use crate::error::PipelineError;
use crate::openai::{ChatMessage, CompletionModel, CompletionParams};
use crate::util::{extract_json_array, fill_template, trunc_for_log};

// Creativity is wanted here, and question sets are larger payloads.
const GENERATION_TEMPERATURE: f32 = 0.9;
const GENERATION_MAX_TOKENS: u32 = 3000;

pub const DEFAULT_ESSAY_MIN_WORDS: u32 = 50;
pub const DEFAULT_ESSAY_MAX_WORDS: u32 = 200;
const DEFAULT_REASONING: &str = "Reinforces a key concept from the source material.";
const PLACEHOLDER_OPTION_COUNT: usize = 4;

/// Permissive decode target for one raw array element: all fields untyped,
/// so any JSON object decodes. Normalization does the real work.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawQuestion {
  #[serde(alias = "text")]
  pub question: Value,
  #[serde(rename = "type", alias = "kind", alias = "questionType")]
  pub kind: Value,
  #[serde(alias = "level")]
  pub difficulty: Value,
  pub points: Value,
  #[serde(alias = "answers", alias = "answerOptions")]
  pub options: Value,
  #[serde(rename = "minWords", alias = "essayMinWords", alias = "min_words")]
  pub min_words: Value,
  #[serde(rename = "maxWords", alias = "essayMaxWords", alias = "max_words")]
  pub max_words: Value,
  #[serde(alias = "explanation")]
  pub reasoning: Value,
}

pub struct QuestionGenerator {
  model: Arc<dyn CompletionModel>,
  prompts: Prompts,
}

impl QuestionGenerator {
  pub fn new(model: Arc<dyn CompletionModel>, prompts: Prompts) -> Self {
    Self { model, prompts }
  }

  /// Run the generation call and normalize its output.
  #[instrument(
    level = "info",
    skip(self, content, analysis, constraints),
    fields(content_len = content.len(), count = constraints.count, difficulty = %constraints.target_difficulty.as_str())
  )]
  pub async fn generate(
    &self,
    content: &str,
    analysis: &ContentAnalysis,
    constraints: &ResolvedConstraints,
  ) -> Result<Vec<GeneratedQuestion>, PipelineError> {
    let user = self.build_user_prompt(content, analysis, constraints);
    let messages =
      [ChatMessage::system(&self.prompts.generation_system), ChatMessage::user(&user)];
    let params =
      CompletionParams { temperature: GENERATION_TEMPERATURE, max_tokens: GENERATION_MAX_TOKENS };

    let response = self.model.complete(&messages, params).await?;
    let raw = parse_questions(&response)?;
    let questions: Vec<GeneratedQuestion> = raw
      .iter()
      .enumerate()
      .map(|(i, r)| normalize_question(i, r))
      .collect();

    info!(target: "pipeline", generated = questions.len(), requested = constraints.count, "Questions normalized");
    Ok(questions)
  }

  fn build_user_prompt(
    &self,
    content: &str,
    analysis: &ContentAnalysis,
    constraints: &ResolvedConstraints,
  ) -> String {
    let kinds = constraints
      .allowed_kinds
      .iter()
      .map(|k| k.as_str())
      .collect::<Vec<_>>()
      .join(", ");
    let focus = if constraints.focus_areas.is_empty() {
      String::new()
    } else {
      format!(" Focus on: {}.", constraints.focus_areas.join(", "))
    };
    fill_template(
      &self.prompts.generation_user_template,
      &[
        ("count", &constraints.count.to_string()),
        ("kinds", &kinds),
        ("difficulty", constraints.target_difficulty.as_str()),
        ("focus", &focus),
        ("topics", &analysis.main_topics.join(", ")),
        ("key_terms", &analysis.key_terms.join(", ")),
        ("content", content),
      ],
    )
  }
}

/// Parse the (possibly noisy) response, in order of attempt: the trimmed
/// text directly, then the first `[...]` bracketed substring. Both failing
/// is a loud error.
pub fn parse_questions(response: &str) -> Result<Vec<RawQuestion>, PipelineError> {
  let trimmed = response.trim();
  let direct = serde_json::from_str::<Vec<RawQuestion>>(trimmed);
  let direct_err = match direct {
    Ok(raw) => return Ok(raw),
    Err(e) => e,
  };

  if let Some(slice) = extract_json_array(trimmed) {
    if let Ok(raw) = serde_json::from_str::<Vec<RawQuestion>>(slice) {
      return Ok(raw);
    }
  }

  Err(PipelineError::ParseFailed(format!(
    "{direct_err} (response starts: {})",
    trunc_for_log(trimmed, 80)
  )))
}

/// Total raw→strict repair of one array element, by position index.
/// Never fails; every fallback rule is explicit.
pub fn normalize_question(index: usize, raw: &RawQuestion) -> GeneratedQuestion {
  let text = raw
    .question
    .as_str()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .unwrap_or_else(|| format!("Question {}", index + 1));

  let kind = raw
    .kind
    .as_str()
    .map(kind_from_alias)
    .unwrap_or(QuestionKind::MultipleChoice);

  let difficulty = raw
    .difficulty
    .as_str()
    .map(difficulty_from_alias)
    .unwrap_or(Difficulty::Beginner);

  let points = raw
    .points
    .as_u64()
    .filter(|p| *p > 0)
    .map(|p| p as u32)
    .unwrap_or_else(|| points_for_difficulty(difficulty));

  let answer_options = if kind == QuestionKind::MultipleChoice {
    Some(normalize_options(raw.options.as_array()))
  } else {
    None
  };

  let (essay_min_words, essay_max_words) = if kind == QuestionKind::Essay {
    (
      Some(raw.min_words.as_u64().map(|v| v as u32).unwrap_or(DEFAULT_ESSAY_MIN_WORDS)),
      Some(raw.max_words.as_u64().map(|v| v as u32).unwrap_or(DEFAULT_ESSAY_MAX_WORDS)),
    )
  } else {
    (None, None)
  };

  let reasoning = raw
    .reasoning
    .as_str()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .unwrap_or_else(|| DEFAULT_REASONING.to_string());

  GeneratedQuestion {
    text,
    kind,
    difficulty,
    points,
    answer_options,
    essay_min_words,
    essay_max_words,
    reasoning,
    // Computed downstream by the evaluator.
    quality_score: 0,
  }
}

/// Repair a raw option list into the invariant shape: non-empty texts and
/// exactly one correct option.
fn normalize_options(raw: Option<&Vec<Value>>) -> Vec<AnswerOption> {
  let mut options: Vec<AnswerOption> = raw
    .map(|arr| {
      arr
        .iter()
        .enumerate()
        .map(|(j, opt)| AnswerOption {
          text: opt
            .get("text")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("Option {}", j + 1)),
          is_correct: opt
            .get("isCorrect")
            .or_else(|| opt.get("correct"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        })
        .collect()
    })
    .unwrap_or_default();

  if options.is_empty() {
    options = placeholder_options();
  }
  enforce_single_correct(&mut options);
  options
}

/// Fixed placeholder set used when the model omitted options entirely.
fn placeholder_options() -> Vec<AnswerOption> {
  (0..PLACEHOLDER_OPTION_COUNT)
    .map(|j| AnswerOption { text: format!("Option {}", j + 1), is_correct: j == 0 })
    .collect()
}

/// First-correct-wins, in a single forward scan: the first correct option
/// stays, later ones are forced false, and if none is correct the first
/// option becomes correct.
fn enforce_single_correct(options: &mut [AnswerOption]) {
  let mut seen_correct = false;
  for opt in options.iter_mut() {
    if opt.is_correct {
      if seen_correct {
        opt.is_correct = false;
      } else {
        seen_correct = true;
      }
    }
  }
  if !seen_correct {
    if let Some(first) = options.first_mut() {
      first.is_correct = true;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;

  fn raw_from(json: serde_json::Value) -> RawQuestion {
    serde_json::from_value(json).expect("raw decode is permissive")
  }

  #[test]
  fn normalization_is_total_over_empty_objects() {
    let raw: Vec<RawQuestion> =
      serde_json::from_str("[{}, {}, {}]").expect("empty objects decode");
    for (i, r) in raw.iter().enumerate() {
      let q = normalize_question(i, r);
      assert_eq!(q.text, format!("Question {}", i + 1));
      assert_eq!(q.kind, QuestionKind::MultipleChoice);
      assert_eq!(q.difficulty, Difficulty::Beginner);
      assert_eq!(q.points, 1);
      let options = q.answer_options.expect("placeholder options");
      assert_eq!(options.len(), 4);
      assert_eq!(options.iter().filter(|o| o.is_correct).count(), 1);
      assert!(q.essay_min_words.is_none() && q.essay_max_words.is_none());
      assert_eq!(q.quality_score, 0);
    }
  }

  #[test]
  fn wrong_shaped_fields_still_normalize() {
    let raw = raw_from(serde_json::json!({
      "question": 42,
      "type": "DRAG_DROP",
      "difficulty": "HARD",
      "points": "many",
      "options": "not an array"
    }));
    let q = normalize_question(0, &raw);
    assert_eq!(q.text, "Question 1");
    assert_eq!(q.kind, QuestionKind::DragAndDrop);
    assert_eq!(q.difficulty, Difficulty::Advanced);
    assert_eq!(q.points, 5);
    // Not multiple choice, so no options despite the junk field.
    assert!(q.answer_options.is_none());
  }

  #[test]
  fn essay_bounds_default_only_for_essays() {
    let essay = normalize_question(0, &raw_from(serde_json::json!({"type": "essay"})));
    assert_eq!(essay.essay_min_words, Some(DEFAULT_ESSAY_MIN_WORDS));
    assert_eq!(essay.essay_max_words, Some(DEFAULT_ESSAY_MAX_WORDS));
    assert!(essay.answer_options.is_none());

    let essay = normalize_question(
      0,
      &raw_from(serde_json::json!({"type": "ESSAY", "minWords": 30, "maxWords": 400})),
    );
    assert_eq!(essay.essay_min_words, Some(30));
    assert_eq!(essay.essay_max_words, Some(400));
  }

  #[test]
  fn multi_correct_keeps_only_the_first_in_scan_order() {
    let raw = raw_from(serde_json::json!({
      "type": "multiple_choice",
      "options": [
        {"text": "a", "isCorrect": false},
        {"text": "b", "isCorrect": true},
        {"text": "c", "isCorrect": true},
        {"text": "d", "isCorrect": true}
      ]
    }));
    let q = normalize_question(0, &raw);
    let options = q.answer_options.unwrap();
    let correct: Vec<&str> =
      options.iter().filter(|o| o.is_correct).map(|o| o.text.as_str()).collect();
    assert_eq!(correct, vec!["b"]);
  }

  #[test]
  fn zero_correct_forces_the_first_option() {
    let mut options = vec![
      AnswerOption { text: "a".into(), is_correct: false },
      AnswerOption { text: "b".into(), is_correct: false },
    ];
    enforce_single_correct(&mut options);
    assert!(options[0].is_correct);
    assert!(!options[1].is_correct);
  }

  #[test]
  fn single_correct_repair_is_idempotent() {
    let mut once = vec![
      AnswerOption { text: "a".into(), is_correct: true },
      AnswerOption { text: "b".into(), is_correct: true },
      AnswerOption { text: "c".into(), is_correct: false },
    ];
    enforce_single_correct(&mut once);
    let mut twice = once.clone();
    enforce_single_correct(&mut twice);
    assert_eq!(
      once.iter().map(|o| o.is_correct).collect::<Vec<_>>(),
      twice.iter().map(|o| o.is_correct).collect::<Vec<_>>()
    );
  }

  #[test]
  fn parse_falls_back_to_bracket_extraction() {
    let noisy = "Here are your questions!\n[{\"question\": \"Why?\"}]\nEnjoy.";
    let raw = parse_questions(noisy).expect("bracket extraction");
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].question.as_str(), Some("Why?"));
  }

  #[test]
  fn unrecoverable_response_is_a_parse_error() {
    let err = parse_questions("I cannot help with that.").unwrap_err();
    assert!(matches!(err, PipelineError::ParseFailed(_)));
  }
}
