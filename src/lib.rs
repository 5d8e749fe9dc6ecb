//! Quizforge · AI-assisted quiz-question generation pipeline
//!
//! Given raw lesson/topic/course text, the pipeline analyzes the content,
//! prompts a completion model for quiz questions, normalizes the model's
//! free-form output into a strict domain schema, scores each question's
//! pedagogical quality deterministically, and records one usage row per
//! invocation.
//!
//! This crate is a library contract: persistence of course content, HTTP
//! routing and auth belong to the caller. The three external boundaries
//! (content store, completion model, audit store) are traits; in-memory
//! stores and a reqwest-backed OpenAI client are provided.
//!
//! Important env variables:
//!   OPENAI_API_KEY        : enables the bundled OpenAI client
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-4o-mini"
//!   QUIZFORGE_CONFIG_PATH : path to TOML config (prompts + calibration)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

pub mod telemetry;
pub mod util;
pub mod error;
pub mod domain;
pub mod config;
pub mod openai;
pub mod content;
pub mod analyzer;
pub mod generator;
pub mod quality;
pub mod usage;
pub mod service;

pub use config::{Calibration, PipelineConfig, Prompts};
pub use domain::{
  AnswerOption, Complexity, ContentAnalysis, ContentKind, ContentScope, Difficulty,
  GeneratedQuestion, GenerationConstraints, QuestionGenerationRequest, QuestionKind,
};
pub use error::PipelineError;
pub use service::{validate_generated_questions, QuestionGenerationService, ValidationReport};
pub use usage::{UsageLogEntry, UsageStats};
