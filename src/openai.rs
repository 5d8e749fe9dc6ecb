//! Generation boundary: role-tagged chat messages in, one completion out.
//!
//! The pipeline only ever sees the `CompletionModel` trait; the bundled
//! implementation calls OpenAI's chat.completions. Calls are instrumented
//! and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to
//! avoid leaking course content into logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::PipelineError;

/// One role-tagged prompt message.
#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: "system".into(), content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self { role: "user".into(), content: content.into() }
  }
}

/// Generation parameters the pipeline varies per stage: the analyzer wants
/// consistency (low temperature, small budget), the generator wants
/// creativity (high temperature, large budget).
#[derive(Clone, Copy, Debug)]
pub struct CompletionParams {
  pub temperature: f32,
  pub max_tokens: u32,
}

/// The external text-completion service. Stateless: one request/response
/// pair per call, no retries or timeouts imposed by the pipeline itself.
#[async_trait]
pub trait CompletionModel: Send + Sync {
  /// Model identifier recorded in audit rows.
  fn model_name(&self) -> &str;

  async fn complete(
    &self,
    messages: &[ChatMessage],
    params: CompletionParams,
  ) -> Result<String, PipelineError>;
}

/// Minimal OpenAI chat.completions client.
#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }
}

#[async_trait]
impl CompletionModel for OpenAI {
  fn model_name(&self) -> &str {
    &self.model
  }

  #[instrument(level = "info", skip(self, messages), fields(model = %self.model, n_messages = messages.len()))]
  async fn complete(
    &self,
    messages: &[ChatMessage],
    params: CompletionParams,
  ) -> Result<String, PipelineError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: messages.to_vec(),
      temperature: params.temperature,
      max_tokens: Some(params.max_tokens),
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "quizforge/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| PipelineError::InvocationFailed(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(PipelineError::InvocationFailed(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| PipelineError::InvocationFailed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        "OpenAI usage"
      );
    }
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Completion received");
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessage>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_body_extraction_prefers_the_nested_message() {
    let body = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
    assert_eq!(extract_openai_error(body), Some("model overloaded".into()));
    assert_eq!(extract_openai_error("not json"), None);
  }
}
