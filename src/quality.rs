//! Deterministic quality scoring.
//!
//! A pure function of one question's fields: base score plus weighted
//! structural and lexical criteria, clamped to 0–100. No randomness, no
//! external calls; only the final ordering is comparative (stable sort,
//! highest score first, ties keep their original relative order).

use tracing::instrument;

use crate::domain::{GeneratedQuestion, QuestionKind};

// ---- Scoring weights and thresholds -------------------------------------

const BASE_SCORE: i32 = 50;

const TEXT_SHORT_CHARS: usize = 20;
const TEXT_LONG_CHARS: usize = 200;
const TEXT_IDEAL_MIN_CHARS: usize = 50; // exclusive
const TEXT_IDEAL_MAX_CHARS: usize = 150; // inclusive
const TEXT_SHORT_SCORE: i32 = 0;
const TEXT_LONG_SCORE: i32 = 5;
const TEXT_IDEAL_SCORE: i32 = 10;
const TEXT_OKAY_SCORE: i32 = 7;

const FORMAT_QUESTION_MARK_SCORE: i32 = 5;
const FORMAT_NO_SIMPLISTIC_LEAD_SCORE: i32 = 5;
const FORMAT_ANALYTICAL_VERB_SCORE: i32 = 5;

const REASONING_MIN_CHARS: usize = 30;
const REASONING_GOOD_CHARS: usize = 50;
const REASONING_LENGTH_SCORE: i32 = 5;
const REASONING_TERM_SCORE: i32 = 5;

const MC_SINGLE_CORRECT_SCORE: i32 = 15;
const MC_OPTION_COUNT_SCORE: i32 = 10;
const MC_OPTION_COUNT_MIN: usize = 3;
const MC_OPTION_COUNT_MAX: usize = 5;
const MC_AVG_LEN_SCORE: i32 = 10;
const MC_AVG_LEN_MIN: f64 = 5.0; // exclusive
const MC_AVG_LEN_MAX: f64 = 50.0; // exclusive
const MC_ALL_NONTRIVIAL_SCORE: i32 = 5;
const MC_TRIVIAL_OPTION_CHARS: usize = 3;

const ESSAY_MIN_WORDS_FLOOR: u32 = 25;
const ESSAY_MAX_WORDS_CEIL: u32 = 500;
const ESSAY_BOUND_SCORE: i32 = 10;
const ESSAY_RANGE_SCORE: i32 = 5;
const ESSAY_RANGE_MIN: u32 = 50;
const ESSAY_RANGE_MAX: u32 = 200;

const CODE_BONUS_SCORE: i32 = 10;

// Localized word sets; swap these lists to re-localize the heuristics.
const SIMPLISTIC_LEAD_WORDS: &[&str] = &["what", "which", "who", "where"];
const ANALYTICAL_VERBS: &[&str] = &["explain", "analyze", "compare", "assess"];
const PEDAGOGICAL_TERMS: &[&str] =
  &["understanding", "knowledge", "analysis", "application", "evaluation"];

/// Score every question, then return them sorted descending by score.
/// `sort_by` is stable, so tied questions keep their original order.
#[instrument(level = "info", skip(questions), fields(n = questions.len()))]
pub fn evaluate(mut questions: Vec<GeneratedQuestion>) -> Vec<GeneratedQuestion> {
  for q in &mut questions {
    q.quality_score = score_question(q);
  }
  questions.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));
  questions
}

/// Compute the 0–100 quality score of a single question.
pub fn score_question(q: &GeneratedQuestion) -> u8 {
  let mut score = BASE_SCORE;
  score += text_length_score(&q.text);
  score += format_score(&q.text);
  score += reasoning_score(&q.reasoning);
  score += match q.kind {
    QuestionKind::MultipleChoice => multiple_choice_score(q),
    QuestionKind::Essay => essay_score(q),
    QuestionKind::Code => CODE_BONUS_SCORE,
    _ => 0,
  };
  score.clamp(0, 100) as u8
}

fn text_length_score(text: &str) -> i32 {
  let len = text.chars().count();
  if len < TEXT_SHORT_CHARS {
    TEXT_SHORT_SCORE
  } else if len > TEXT_LONG_CHARS {
    TEXT_LONG_SCORE
  } else if len > TEXT_IDEAL_MIN_CHARS && len <= TEXT_IDEAL_MAX_CHARS {
    TEXT_IDEAL_SCORE
  } else {
    TEXT_OKAY_SCORE
  }
}

fn format_score(text: &str) -> i32 {
  let lower = text.to_lowercase();
  let mut score = 0;
  if text.contains('?') {
    score += FORMAT_QUESTION_MARK_SCORE;
  }
  if !SIMPLISTIC_LEAD_WORDS.iter().any(|w| lower.starts_with(w)) {
    score += FORMAT_NO_SIMPLISTIC_LEAD_SCORE;
  }
  if ANALYTICAL_VERBS.iter().any(|w| lower.contains(w)) {
    score += FORMAT_ANALYTICAL_VERB_SCORE;
  }
  score
}

fn reasoning_score(reasoning: &str) -> i32 {
  let len = reasoning.chars().count();
  let lower = reasoning.to_lowercase();
  let mut score = 0;
  if len > REASONING_MIN_CHARS {
    score += REASONING_LENGTH_SCORE;
  }
  if len > REASONING_GOOD_CHARS {
    score += REASONING_LENGTH_SCORE;
  }
  if PEDAGOGICAL_TERMS.iter().any(|t| lower.contains(t)) {
    score += REASONING_TERM_SCORE;
  }
  score
}

fn multiple_choice_score(q: &GeneratedQuestion) -> i32 {
  let Some(options) = q.answer_options.as_deref() else {
    return 0;
  };
  let mut score = 0;
  if options.iter().filter(|o| o.is_correct).count() == 1 {
    score += MC_SINGLE_CORRECT_SCORE;
  }
  if (MC_OPTION_COUNT_MIN..=MC_OPTION_COUNT_MAX).contains(&options.len()) {
    score += MC_OPTION_COUNT_SCORE;
  }
  if !options.is_empty() {
    let avg = options.iter().map(|o| o.text.chars().count()).sum::<usize>() as f64
      / options.len() as f64;
    if avg > MC_AVG_LEN_MIN && avg < MC_AVG_LEN_MAX {
      score += MC_AVG_LEN_SCORE;
    }
  }
  if !options.is_empty()
    && options.iter().all(|o| o.text.chars().count() > MC_TRIVIAL_OPTION_CHARS)
  {
    score += MC_ALL_NONTRIVIAL_SCORE;
  }
  score
}

fn essay_score(q: &GeneratedQuestion) -> i32 {
  let mut score = 0;
  if q.essay_min_words.map(|m| m >= ESSAY_MIN_WORDS_FLOOR).unwrap_or(false) {
    score += ESSAY_BOUND_SCORE;
  }
  if q.essay_max_words.map(|m| m <= ESSAY_MAX_WORDS_CEIL).unwrap_or(false) {
    score += ESSAY_BOUND_SCORE;
  }
  if let (Some(min), Some(max)) = (q.essay_min_words, q.essay_max_words) {
    if let Some(range) = max.checked_sub(min) {
      if (ESSAY_RANGE_MIN..=ESSAY_RANGE_MAX).contains(&range) {
        score += ESSAY_RANGE_SCORE;
      }
    }
  }
  score
}
