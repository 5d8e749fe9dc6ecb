//! Usage/cost telemetry: one append-only audit row per pipeline invocation,
//! plus windowed aggregate statistics.
//!
//! Recording NEVER fails the caller: audit logging must not abort a
//! user-facing operation, so insert failures are warned about and dropped.
//! Reads are eventually-consistent snapshots of whatever the store holds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::Calibration;
use crate::domain::{Difficulty, QuestionKind};
use crate::error::PipelineError;

pub const OPERATION_QUESTION_GENERATION: &str = "question_generation";

/// Shape of the originating request — never the raw content.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
  pub scope_kind: String,
  pub scope_id: Option<String>,
  pub requested_count: usize,
  pub requested_kinds: Vec<QuestionKind>,
  pub target_difficulty: Difficulty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
  pub questions_generated: usize,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// One persisted, append-only audit row.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
  pub id: String,
  pub operation: String,
  pub model: String,
  pub tokens_used: u64,
  pub request_summary: RequestSummary,
  pub outcome_summary: OutcomeSummary,
  pub success: bool,
  pub created_at: DateTime<Utc>,
}

/// Aggregate snapshot over a date window, as the audit store reports it.
#[derive(Clone, Debug, Default)]
pub struct UsageAggregate {
  pub token_sum: u64,
  pub total: usize,
  pub successful: usize,
  /// `questions_generated` of each successful row, for the yield average.
  pub successful_question_counts: Vec<usize>,
}

/// Aggregates exposed to callers.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
  pub total_tokens_used: u64,
  pub total_requests: usize,
  /// successful / total × 100, 0 when there are no rows.
  pub success_rate: f64,
  /// Mean questions per successful request, 0 when none succeeded.
  pub avg_questions_per_request: f64,
  pub estimated_cost: f64,
}

/// The audit store boundary: independent inserts, windowed aggregates.
#[async_trait]
pub trait UsageStore: Send + Sync {
  async fn insert(&self, entry: UsageLogEntry) -> Result<(), String>;

  async fn aggregate(
    &self,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
  ) -> Result<UsageAggregate, String>;
}

/// In-memory audit store; append-only `Vec` behind a lock.
#[derive(Clone, Default)]
pub struct InMemoryUsageStore {
  entries: Arc<RwLock<Vec<UsageLogEntry>>>,
}

impl InMemoryUsageStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn entries(&self) -> Vec<UsageLogEntry> {
    self.entries.read().await.clone()
  }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
  async fn insert(&self, entry: UsageLogEntry) -> Result<(), String> {
    self.entries.write().await.push(entry);
    Ok(())
  }

  async fn aggregate(
    &self,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
  ) -> Result<UsageAggregate, String> {
    let entries = self.entries.read().await;
    let mut agg = UsageAggregate::default();
    for e in entries.iter() {
      if start.map(|s| e.created_at < s).unwrap_or(false) {
        continue;
      }
      if end.map(|t| e.created_at > t).unwrap_or(false) {
        continue;
      }
      agg.token_sum += e.tokens_used;
      agg.total += 1;
      if e.success {
        agg.successful += 1;
        agg.successful_question_counts.push(e.outcome_summary.questions_generated);
      }
    }
    Ok(agg)
  }
}

/// Writes audit rows and answers statistics queries.
pub struct UsageLogger {
  store: Arc<dyn UsageStore>,
  model: String,
  calibration: Calibration,
}

impl UsageLogger {
  pub fn new(store: Arc<dyn UsageStore>, model: impl Into<String>, calibration: Calibration) -> Self {
    Self { store, model: model.into(), calibration }
  }

  /// Token-cost estimate: ceil(content_len / chars_per_token) + overhead.
  pub fn estimate_tokens(&self, content_len: usize) -> u64 {
    let cpt = self.calibration.chars_per_token.max(1) as u64;
    let len = content_len as u64;
    len.div_ceil(cpt) + u64::from(self.calibration.token_overhead)
  }

  /// Record one audit row. Never fails: a persistence problem is warned
  /// about and otherwise ignored.
  #[instrument(level = "info", skip(self, request), fields(%success, questions_generated))]
  pub async fn record_usage(
    &self,
    request: RequestSummary,
    content_len: usize,
    questions_generated: usize,
    success: bool,
    error: Option<String>,
  ) {
    let entry = UsageLogEntry {
      id: Uuid::new_v4().to_string(),
      operation: OPERATION_QUESTION_GENERATION.into(),
      model: self.model.clone(),
      tokens_used: self.estimate_tokens(content_len),
      request_summary: request,
      outcome_summary: OutcomeSummary { questions_generated, error },
      success,
      created_at: Utc::now(),
    };
    if let Err(e) = self.store.insert(entry).await {
      warn!(target: "pipeline", error = %e, "Usage log insert failed; continuing without audit row");
    }
  }

  /// Aggregate usage over an optional date window (inclusive bounds).
  #[instrument(level = "debug", skip(self))]
  pub async fn statistics(
    &self,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
  ) -> Result<UsageStats, PipelineError> {
    let agg = self.store.aggregate(start, end).await.map_err(PipelineError::Storage)?;
    let success_rate = if agg.total == 0 {
      0.0
    } else {
      agg.successful as f64 / agg.total as f64 * 100.0
    };
    let avg_questions_per_request = if agg.successful_question_counts.is_empty() {
      0.0
    } else {
      agg.successful_question_counts.iter().sum::<usize>() as f64
        / agg.successful_question_counts.len() as f64
    };
    Ok(UsageStats {
      total_tokens_used: agg.token_sum,
      total_requests: agg.total,
      success_rate,
      avg_questions_per_request,
      estimated_cost: agg.token_sum as f64 / 1000.0 * self.calibration.cost_per_1k_tokens,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn summary() -> RequestSummary {
    RequestSummary {
      scope_kind: "lesson".into(),
      scope_id: Some("l1".into()),
      requested_count: 5,
      requested_kinds: vec![QuestionKind::MultipleChoice],
      target_difficulty: Difficulty::Beginner,
    }
  }

  fn entry(tokens: u64, success: bool, questions: usize) -> UsageLogEntry {
    UsageLogEntry {
      id: Uuid::new_v4().to_string(),
      operation: OPERATION_QUESTION_GENERATION.into(),
      model: "stub".into(),
      tokens_used: tokens,
      request_summary: summary(),
      outcome_summary: OutcomeSummary {
        questions_generated: questions,
        error: (!success).then(|| "boom".to_string()),
      },
      success,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn token_estimate_rounds_up_and_adds_overhead() {
    let logger =
      UsageLogger::new(Arc::new(InMemoryUsageStore::new()), "m", Calibration::default());
    assert_eq!(logger.estimate_tokens(0), 500);
    assert_eq!(logger.estimate_tokens(1), 501);
    assert_eq!(logger.estimate_tokens(1000), 750);
  }

  #[tokio::test]
  async fn statistics_match_the_documented_example() {
    let store = Arc::new(InMemoryUsageStore::new());
    store.insert(entry(1000, true, 4)).await.unwrap();
    store.insert(entry(500, false, 0)).await.unwrap();

    let calibration = Calibration::default();
    let logger = UsageLogger::new(store, "m", calibration);
    let stats = logger.statistics(None, None).await.expect("stats");
    assert_eq!(stats.total_tokens_used, 1500);
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.success_rate, 50.0);
    assert_eq!(stats.avg_questions_per_request, 4.0);
    assert_eq!(stats.estimated_cost, 1500.0 / 1000.0 * calibration.cost_per_1k_tokens);
  }

  #[tokio::test]
  async fn statistics_on_an_empty_store_are_all_zero() {
    let logger =
      UsageLogger::new(Arc::new(InMemoryUsageStore::new()), "m", Calibration::default());
    let stats = logger.statistics(None, None).await.expect("stats");
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.avg_questions_per_request, 0.0);
  }

  #[tokio::test]
  async fn record_usage_swallows_store_failures() {
    struct FailingStore;

    #[async_trait]
    impl UsageStore for FailingStore {
      async fn insert(&self, _entry: UsageLogEntry) -> Result<(), String> {
        Err("disk full".into())
      }
      async fn aggregate(
        &self,
        _start: Option<DateTime<Utc>>,
        _end: Option<DateTime<Utc>>,
      ) -> Result<UsageAggregate, String> {
        Err("disk full".into())
      }
    }

    let logger = UsageLogger::new(Arc::new(FailingStore), "m", Calibration::default());
    // Must not panic or surface the error.
    logger.record_usage(summary(), 100, 3, true, None).await;
  }

  #[tokio::test]
  async fn date_window_is_inclusive() {
    let store = Arc::new(InMemoryUsageStore::new());
    let mut e = entry(100, true, 2);
    let at = Utc::now();
    e.created_at = at;
    store.insert(e).await.unwrap();

    let agg = store.aggregate(Some(at), Some(at)).await.unwrap();
    assert_eq!(agg.total, 1);
    let agg = store.aggregate(Some(at + chrono::Duration::seconds(1)), None).await.unwrap();
    assert_eq!(agg.total, 0);
  }
}
