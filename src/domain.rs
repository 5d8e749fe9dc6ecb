//! Domain models: question kinds/difficulties, answer options, generated
//! questions, content analysis, and the generation request shapes.
//!
//! Alias mapping for kinds and difficulties is table-driven so the accepted
//! variants stay auditable in one place; unknown values take the documented
//! safe default instead of failing.

use serde::{Deserialize, Serialize};

/// Question formats the pipeline can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
  MultipleChoice,
  FillInBlank,
  Essay,
  Matching,
  Code,
  DragAndDrop,
}

impl QuestionKind {
  /// Canonical wire label, also used inside the generation prompt.
  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionKind::MultipleChoice => "MULTIPLE_CHOICE",
      QuestionKind::FillInBlank => "FILL_IN_BLANK",
      QuestionKind::Essay => "ESSAY",
      QuestionKind::Matching => "MATCHING",
      QuestionKind::Code => "CODE",
      QuestionKind::DragAndDrop => "DRAG_AND_DROP",
    }
  }
}

/// Target difficulty of a generated question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Beginner => "BEGINNER",
      Difficulty::Intermediate => "INTERMEDIATE",
      Difficulty::Advanced => "ADVANCED",
    }
  }
}

/// Complexity estimate of the analyzed source content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
  Beginner,
  Intermediate,
  Advanced,
}

impl Complexity {
  /// Strict label parse; callers supply the default branch.
  pub fn from_label(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "beginner" => Some(Complexity::Beginner),
      "intermediate" => Some(Complexity::Intermediate),
      "advanced" => Some(Complexity::Advanced),
      _ => None,
    }
  }

  /// Direct complexity → target-difficulty mapping used when the caller
  /// supplies no explicit difficulty.
  pub fn to_difficulty(self) -> Difficulty {
    match self {
      Complexity::Beginner => Difficulty::Beginner,
      Complexity::Intermediate => Difficulty::Intermediate,
      Complexity::Advanced => Difficulty::Advanced,
    }
  }
}

/// What kind of material the analyzed content mostly is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
  Text,
  Code,
  Mixed,
}

impl ContentKind {
  pub fn from_label(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "text" => Some(ContentKind::Text),
      "code" => Some(ContentKind::Code),
      "mixed" => Some(ContentKind::Mixed),
      _ => None,
    }
  }
}

// ---- Alias tables -------------------------------------------------------
//
// Keys are lowercased with '-', ' ' squashed to '_' before lookup, so the
// tables list each accepted spelling once.

const KIND_ALIASES: &[(&str, QuestionKind)] = &[
  ("multiple_choice", QuestionKind::MultipleChoice),
  ("multiplechoice", QuestionKind::MultipleChoice),
  ("mcq", QuestionKind::MultipleChoice),
  ("choice", QuestionKind::MultipleChoice),
  ("fill_in_blank", QuestionKind::FillInBlank),
  ("fill_in_the_blank", QuestionKind::FillInBlank),
  ("fill_blank", QuestionKind::FillInBlank),
  ("fillblank", QuestionKind::FillInBlank),
  ("essay", QuestionKind::Essay),
  ("open_ended", QuestionKind::Essay),
  ("matching", QuestionKind::Matching),
  ("match", QuestionKind::Matching),
  ("code", QuestionKind::Code),
  ("coding", QuestionKind::Code),
  ("drag_and_drop", QuestionKind::DragAndDrop),
  ("drag_drop", QuestionKind::DragAndDrop),
  ("draganddrop", QuestionKind::DragAndDrop),
];

const DIFFICULTY_ALIASES: &[(&str, Difficulty)] = &[
  ("beginner", Difficulty::Beginner),
  ("easy", Difficulty::Beginner),
  ("basic", Difficulty::Beginner),
  ("intermediate", Difficulty::Intermediate),
  ("medium", Difficulty::Intermediate),
  ("moderate", Difficulty::Intermediate),
  ("advanced", Difficulty::Advanced),
  ("hard", Difficulty::Advanced),
  ("expert", Difficulty::Advanced),
];

/// Points awarded when the model omits them, keyed by difficulty.
/// The trailing default (2) covers the lookup-miss branch.
const DIFFICULTY_POINTS: &[(Difficulty, u32)] = &[
  (Difficulty::Beginner, 1),
  (Difficulty::Intermediate, 3),
  (Difficulty::Advanced, 5),
];

const DEFAULT_POINTS: u32 = 2;

fn normalize_alias_key(raw: &str) -> String {
  raw
    .trim()
    .to_lowercase()
    .chars()
    .map(|c| if c == '-' || c == ' ' { '_' } else { c })
    .collect()
}

/// Map a loosely spelled kind string to the enum; unknowns default to
/// MULTIPLE_CHOICE.
pub fn kind_from_alias(raw: &str) -> QuestionKind {
  let key = normalize_alias_key(raw);
  KIND_ALIASES
    .iter()
    .find(|(alias, _)| *alias == key)
    .map(|(_, kind)| *kind)
    .unwrap_or(QuestionKind::MultipleChoice)
}

/// Map a loosely spelled difficulty string to the enum; unknowns default to
/// BEGINNER.
pub fn difficulty_from_alias(raw: &str) -> Difficulty {
  let key = normalize_alias_key(raw);
  DIFFICULTY_ALIASES
    .iter()
    .find(|(alias, _)| *alias == key)
    .map(|(_, d)| *d)
    .unwrap_or(Difficulty::Beginner)
}

pub fn points_for_difficulty(difficulty: Difficulty) -> u32 {
  DIFFICULTY_POINTS
    .iter()
    .find(|(d, _)| *d == difficulty)
    .map(|(_, p)| *p)
    .unwrap_or(DEFAULT_POINTS)
}

// ---- Value objects ------------------------------------------------------

/// One answer option of a multiple-choice question.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerOption {
  pub text: String,
  #[serde(rename = "isCorrect")]
  pub is_correct: bool,
}

/// The central value object: one fully normalized quiz question.
/// Created by the generator, scored once by the evaluator, then handed to
/// the caller; never mutated again inside this crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
  pub text: String,
  pub kind: QuestionKind,
  pub difficulty: Difficulty,
  pub points: u32,
  /// Present iff kind = MULTIPLE_CHOICE, always with exactly one correct
  /// option after normalization.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub answer_options: Option<Vec<AnswerOption>>,
  /// Present iff kind = ESSAY.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub essay_min_words: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub essay_max_words: Option<u32>,
  pub reasoning: String,
  /// 0 until the evaluator runs, then a final 0–100 score.
  pub quality_score: u8,
}

/// Structured summary of the analyzed content. Always fully populated:
/// missing or invalid model output is replaced by explicit defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
  pub main_topics: Vec<String>,
  pub key_terms: Vec<String>,
  pub complexity: Complexity,
  pub content_kind: ContentKind,
  pub estimated_reading_minutes: u32,
}

/// Caller-supplied generation constraints; every field optional, with
/// documented defaults applied by `resolve`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConstraints {
  pub count: Option<usize>,
  pub allowed_kinds: Option<Vec<QuestionKind>>,
  pub target_difficulty: Option<Difficulty>,
  pub focus_areas: Option<Vec<String>>,
}

pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// Constraints with every default applied; what the prompt and the audit
/// row are actually built from.
#[derive(Clone, Debug)]
pub struct ResolvedConstraints {
  pub count: usize,
  pub allowed_kinds: Vec<QuestionKind>,
  pub target_difficulty: Difficulty,
  pub focus_areas: Vec<String>,
}

impl GenerationConstraints {
  pub fn resolve(&self, analysis: &ContentAnalysis) -> ResolvedConstraints {
    ResolvedConstraints {
      count: self.count.filter(|c| *c > 0).unwrap_or(DEFAULT_QUESTION_COUNT),
      allowed_kinds: self
        .allowed_kinds
        .clone()
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| vec![QuestionKind::MultipleChoice, QuestionKind::FillInBlank]),
      target_difficulty: self
        .target_difficulty
        .unwrap_or_else(|| analysis.complexity.to_difficulty()),
      focus_areas: self.focus_areas.clone().unwrap_or_default(),
    }
  }
}

/// Content granularity a generation request targets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContentScope {
  Lesson(String),
  Topic(String),
  Course(String),
}

impl ContentScope {
  pub fn kind_label(&self) -> &'static str {
    match self {
      ContentScope::Lesson(_) => "lesson",
      ContentScope::Topic(_) => "topic",
      ContentScope::Course(_) => "course",
    }
  }

  pub fn id(&self) -> &str {
    match self {
      ContentScope::Lesson(id) | ContentScope::Topic(id) | ContentScope::Course(id) => id,
    }
  }
}

/// A full generation request: raw text plus constraints, optionally tagged
/// with the scope it was fetched from (scope entry points fill this in).
#[derive(Clone, Debug)]
pub struct QuestionGenerationRequest {
  pub content: String,
  pub scope: Option<ContentScope>,
  pub constraints: GenerationConstraints,
}

impl QuestionGenerationRequest {
  pub fn from_text(content: impl Into<String>) -> Self {
    Self { content: content.into(), scope: None, constraints: GenerationConstraints::default() }
  }
}
