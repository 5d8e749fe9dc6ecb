//! Orchestrator: sequences fetch → analyze → generate → evaluate → log,
//! with error-to-log translation and scope-specific entry points.
//!
//! Per invocation the flow is linear, no retries, no partial success. Any
//! generation-stage failure short-circuits to a `success=false` audit row
//! and a uniformly worded error; analyzer failures never reach this level
//! (the analyzer absorbs them itself). Exactly one usage row is written per
//! invocation, success or failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::analyzer::ContentAnalyzer;
use crate::config::PipelineConfig;
use crate::content::ContentSource;
use crate::domain::{
  ContentScope, GeneratedQuestion, GenerationConstraints, QuestionGenerationRequest, QuestionKind,
  ResolvedConstraints,
};
use crate::error::PipelineError;
use crate::generator::QuestionGenerator;
use crate::openai::CompletionModel;
use crate::quality;
use crate::usage::{RequestSummary, UsageLogger, UsageStats, UsageStore};

/// Minimum question-text length accepted by the structural validator.
const VALIDATOR_MIN_TEXT_CHARS: usize = 10;
/// Minimum option count for a multiple-choice question.
const VALIDATOR_MIN_OPTIONS: usize = 2;
/// Quality floor below which the validator flags a question.
const VALIDATOR_MIN_SCORE: u8 = 50;

/// Result of the standalone structural validator: issue strings, not
/// exceptions — callers may run it against externally supplied sets too.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
  pub valid: bool,
  pub issues: Vec<String>,
}

pub struct QuestionGenerationService {
  content: Arc<dyn ContentSource>,
  analyzer: ContentAnalyzer,
  generator: QuestionGenerator,
  usage: UsageLogger,
}

impl QuestionGenerationService {
  pub fn new(
    content: Arc<dyn ContentSource>,
    model: Arc<dyn CompletionModel>,
    usage_store: Arc<dyn UsageStore>,
    config: PipelineConfig,
  ) -> Self {
    let model_name = model.model_name().to_string();
    Self {
      content,
      analyzer: ContentAnalyzer::new(
        model.clone(),
        config.prompts.clone(),
        config.calibration,
      ),
      generator: QuestionGenerator::new(model, config.prompts),
      usage: UsageLogger::new(usage_store, model_name, config.calibration),
    }
  }

  /// Core entry point: analyze → generate → evaluate → log → return.
  #[instrument(level = "info", skip(self, request), fields(content_len = request.content.len(), scope = ?request.scope))]
  pub async fn generate_from_content(
    &self,
    request: QuestionGenerationRequest,
  ) -> Result<Vec<GeneratedQuestion>, PipelineError> {
    let analysis = self.analyzer.analyze(&request.content).await;
    let resolved = request.constraints.resolve(&analysis);
    let summary = request_summary(&request, &resolved);

    match self.generator.generate(&request.content, &analysis, &resolved).await {
      Ok(questions) => {
        let questions = quality::evaluate(questions);
        self
          .usage
          .record_usage(summary, request.content.len(), questions.len(), true, None)
          .await;
        info!(target: "pipeline", generated = questions.len(), "Question generation succeeded");
        Ok(questions)
      }
      Err(e) => {
        let msg = e.to_string();
        error!(target: "pipeline", error = %msg, "Question generation failed");
        self
          .usage
          .record_usage(summary, request.content.len(), 0, false, Some(msg.clone()))
          .await;
        Err(PipelineError::GenerationFailed(msg))
      }
    }
  }

  /// Fetch a lesson's text, then delegate. `NotFound`/`EmptyContent`
  /// propagate unchanged.
  pub async fn generate_from_lesson(
    &self,
    id: &str,
    constraints: GenerationConstraints,
  ) -> Result<Vec<GeneratedQuestion>, PipelineError> {
    let content = self.content.lesson_text(id).await?;
    self
      .generate_from_content(QuestionGenerationRequest {
        content,
        scope: Some(ContentScope::Lesson(id.to_string())),
        constraints,
      })
      .await
  }

  pub async fn generate_from_topic(
    &self,
    id: &str,
    constraints: GenerationConstraints,
  ) -> Result<Vec<GeneratedQuestion>, PipelineError> {
    let content = self.content.topic_text(id).await?;
    self
      .generate_from_content(QuestionGenerationRequest {
        content,
        scope: Some(ContentScope::Topic(id.to_string())),
        constraints,
      })
      .await
  }

  pub async fn generate_from_course(
    &self,
    id: &str,
    constraints: GenerationConstraints,
  ) -> Result<Vec<GeneratedQuestion>, PipelineError> {
    let content = self.content.course_text(id).await?;
    self
      .generate_from_content(QuestionGenerationRequest {
        content,
        scope: Some(ContentScope::Course(id.to_string())),
        constraints,
      })
      .await
  }

  /// Aggregate usage statistics over an optional date window.
  pub async fn usage_statistics(
    &self,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
  ) -> Result<UsageStats, PipelineError> {
    self.usage.statistics(start, end).await
  }
}

fn request_summary(
  request: &QuestionGenerationRequest,
  resolved: &ResolvedConstraints,
) -> RequestSummary {
  RequestSummary {
    scope_kind: request.scope.as_ref().map(|s| s.kind_label()).unwrap_or("raw").to_string(),
    scope_id: request.scope.as_ref().map(|s| s.id().to_string()),
    requested_count: resolved.count,
    requested_kinds: resolved.allowed_kinds.clone(),
    target_difficulty: resolved.target_difficulty,
  }
}

/// Structural validation of an already-generated question set. Reporting
/// only, independent of generation.
pub fn validate_generated_questions(questions: &[GeneratedQuestion]) -> ValidationReport {
  let mut issues = Vec::new();
  for (i, q) in questions.iter().enumerate() {
    let n = i + 1;
    if q.text.chars().count() < VALIDATOR_MIN_TEXT_CHARS {
      issues.push(format!("question {n}: text is too short"));
    }
    if q.kind == QuestionKind::MultipleChoice {
      let options = q.answer_options.as_deref().unwrap_or_default();
      if options.len() < VALIDATOR_MIN_OPTIONS {
        issues.push(format!("question {n}: too few answer options"));
      }
      if options.iter().filter(|o| o.is_correct).count() != 1 {
        issues.push(format!("question {n}: must have exactly one correct option"));
      }
    }
    if q.kind == QuestionKind::Essay
      && (q.essay_min_words.is_none() || q.essay_max_words.is_none())
    {
      issues.push(format!("question {n}: missing essay word bounds"));
    }
    if q.quality_score < VALIDATOR_MIN_SCORE {
      issues.push(format!("question {n}: low quality score ({})", q.quality_score));
    }
  }
  ValidationReport { valid: issues.is_empty(), issues }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::content::{Fragment, InMemoryContentStore, LessonRecord};
  use crate::domain::{AnswerOption, Difficulty};
  use crate::openai::{ChatMessage, CompletionParams};
  use crate::usage::InMemoryUsageStore;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Stub boundary that replays canned replies in call order.
  struct ScriptedModel {
    replies: Vec<Result<String, String>>,
    calls: AtomicUsize,
  }

  impl ScriptedModel {
    fn new(replies: Vec<Result<String, String>>) -> Self {
      Self { replies, calls: AtomicUsize::new(0) }
    }
  }

  #[async_trait]
  impl CompletionModel for ScriptedModel {
    fn model_name(&self) -> &str {
      "scripted-stub"
    }

    async fn complete(
      &self,
      _messages: &[ChatMessage],
      _params: CompletionParams,
    ) -> Result<String, PipelineError> {
      let i = self.calls.fetch_add(1, Ordering::SeqCst);
      self
        .replies
        .get(i.min(self.replies.len().saturating_sub(1)))
        .cloned()
        .unwrap_or(Err("no scripted reply".into()))
        .map_err(PipelineError::InvocationFailed)
    }
  }

  async fn service_with(
    replies: Vec<Result<String, String>>,
  ) -> (QuestionGenerationService, Arc<InMemoryUsageStore>) {
    let content = Arc::new(InMemoryContentStore::new());
    content
      .insert_lesson(LessonRecord {
        id: "l1".into(),
        topic_id: "t1".into(),
        order: 1,
        deleted: false,
        fragments: vec![Fragment {
          order: 1,
          body: "Ownership moves values; borrowing lends them.".into(),
          deleted: false,
        }],
      })
      .await;
    let usage_store = Arc::new(InMemoryUsageStore::new());
    let service = QuestionGenerationService::new(
      content,
      Arc::new(ScriptedModel::new(replies)),
      usage_store.clone(),
      PipelineConfig::default(),
    );
    (service, usage_store)
  }

  fn analysis_reply() -> Result<String, String> {
    Ok(
      serde_json::json!({
        "mainTopics": ["ownership"],
        "keyTerms": ["borrow", "move"],
        "complexity": "intermediate",
        "contentType": "text",
        "estimatedReadingTime": 2
      })
      .to_string(),
    )
  }

  fn questions_reply() -> Result<String, String> {
    Ok(
      serde_json::json!([
        {
          "question": "Explain how ownership transfer differs from borrowing in practice?",
          "type": "MULTIPLE_CHOICE",
          "difficulty": "INTERMEDIATE",
          "options": [
            {"text": "The value is moved and the source is invalidated", "isCorrect": true},
            {"text": "The value is always copied byte for byte", "isCorrect": false},
            {"text": "Both alias the value forever", "isCorrect": false},
            {"text": "Neither compiles", "isCorrect": false}
          ],
          "reasoning": "Tests understanding of the core ownership model, not syntax."
        },
        {
          "question": "Fill in the missing keyword for an immutable reference.",
          "type": "FILL_IN_BLANK",
          "difficulty": "EASY"
        }
      ])
      .to_string(),
    )
  }

  #[tokio::test]
  async fn success_path_scores_sorts_and_logs_one_row() {
    let (service, usage_store) =
      service_with(vec![analysis_reply(), questions_reply()]).await;
    let questions = service
      .generate_from_lesson("l1", GenerationConstraints::default())
      .await
      .expect("questions");

    assert_eq!(questions.len(), 2);
    // Sorted descending by score; the rich MC question wins.
    assert!(questions[0].quality_score >= questions[1].quality_score);
    assert_eq!(questions[0].kind, QuestionKind::MultipleChoice);
    assert!(questions.iter().all(|q| q.quality_score <= 100));

    let entries = usage_store.entries().await;
    assert_eq!(entries.len(), 1);
    let row = &entries[0];
    assert!(row.success);
    assert_eq!(row.outcome_summary.questions_generated, 2);
    assert_eq!(row.request_summary.scope_kind, "lesson");
    assert_eq!(row.request_summary.scope_id.as_deref(), Some("l1"));
    assert_eq!(row.model, "scripted-stub");
  }

  #[tokio::test]
  async fn generation_failure_logs_one_failure_row_and_wraps_the_error() {
    // The analyzer call fails too, but that only triggers its fallback;
    // the generator's failure is the one that surfaces.
    let (service, usage_store) =
      service_with(vec![Err("model on fire".into()), Err("model on fire".into())]).await;
    let err = service
      .generate_from_lesson("l1", GenerationConstraints::default())
      .await
      .unwrap_err();

    let msg = err.to_string();
    assert!(msg.starts_with("Failed to generate questions: "), "got: {msg}");
    assert!(msg.contains("model on fire"));

    let entries = usage_store.entries().await;
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
    assert_eq!(entries[0].outcome_summary.questions_generated, 0);
    assert!(entries[0].outcome_summary.error.as_deref().unwrap().contains("model on fire"));
  }

  #[tokio::test]
  async fn unknown_lesson_propagates_not_found_without_a_usage_row() {
    let (service, usage_store) = service_with(vec![analysis_reply()]).await;
    let err = service
      .generate_from_lesson("missing", GenerationConstraints::default())
      .await
      .unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { scope: "lesson", .. }));
    assert!(usage_store.entries().await.is_empty());
  }

  #[tokio::test]
  async fn unparseable_generation_output_is_a_logged_failure() {
    let (service, usage_store) =
      service_with(vec![analysis_reply(), Ok("no json at all".into())]).await;
    let err = service
      .generate_from_lesson("l1", GenerationConstraints::default())
      .await
      .unwrap_err();
    assert!(err.to_string().starts_with("Failed to generate questions: "));
    let entries = usage_store.entries().await;
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
  }

  #[test]
  fn validator_reports_issues_by_position() {
    let mc = GeneratedQuestion {
      text: "Pick the correct statement about traits and generics in Rust?".into(),
      kind: QuestionKind::MultipleChoice,
      difficulty: Difficulty::Beginner,
      points: 1,
      answer_options: Some(vec![AnswerOption { text: "only one".into(), is_correct: true }]),
      essay_min_words: None,
      essay_max_words: None,
      reasoning: "r".into(),
      quality_score: 30,
    };
    let essay = GeneratedQuestion {
      text: "Discuss the tradeoffs of dynamic dispatch at length.".into(),
      kind: QuestionKind::Essay,
      difficulty: Difficulty::Advanced,
      points: 5,
      answer_options: None,
      essay_min_words: Some(50),
      essay_max_words: None,
      reasoning: "r".into(),
      quality_score: 80,
    };

    let report = validate_generated_questions(&[mc, essay]);
    assert!(!report.valid);
    assert!(report.issues.contains(&"question 1: too few answer options".to_string()));
    assert!(report.issues.contains(&"question 1: low quality score (30)".to_string()));
    assert!(report.issues.contains(&"question 2: missing essay word bounds".to_string()));
    // The single option IS the one correct option, so no correctness issue.
    assert!(!report.issues.iter().any(|i| i.contains("exactly one correct")));
  }

  #[test]
  fn validator_accepts_a_clean_set() {
    let q = GeneratedQuestion {
      text: "Compare borrowing and ownership transfer for function arguments?".into(),
      kind: QuestionKind::MultipleChoice,
      difficulty: Difficulty::Intermediate,
      points: 3,
      answer_options: Some(vec![
        AnswerOption { text: "moves invalidate".into(), is_correct: true },
        AnswerOption { text: "borrows do not".into(), is_correct: false },
      ]),
      essay_min_words: None,
      essay_max_words: None,
      reasoning: "r".into(),
      quality_score: 85,
    };
    let report = validate_generated_questions(&[q]);
    assert!(report.valid);
    assert!(report.issues.is_empty());
  }
}
