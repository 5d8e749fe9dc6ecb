//! Content store boundary and the in-memory implementation.
//!
//! The pipeline only *reads* course content: given a scope id it wants the
//! concatenation of all non-deleted fragments under that scope, ordered by
//! their declared order within their parent, recursively for topic/course
//! scope. A single read is the whole contract — no caching, no retries.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::error::PipelineError;

/// Blank-line separator between concatenated fragments.
const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Resolves a scope id to its full text, failing with `NotFound` when the
/// scope entity is absent and `EmptyContent` when the text is blank.
#[async_trait]
pub trait ContentSource: Send + Sync {
  async fn lesson_text(&self, id: &str) -> Result<String, PipelineError>;
  async fn topic_text(&self, id: &str) -> Result<String, PipelineError>;
  async fn course_text(&self, id: &str) -> Result<String, PipelineError>;
}

/// One ordered unit of lesson text.
#[derive(Clone, Debug)]
pub struct Fragment {
  pub order: u32,
  pub body: String,
  pub deleted: bool,
}

#[derive(Clone, Debug)]
pub struct LessonRecord {
  pub id: String,
  pub topic_id: String,
  pub order: u32,
  pub deleted: bool,
  pub fragments: Vec<Fragment>,
}

#[derive(Clone, Debug)]
pub struct TopicRecord {
  pub id: String,
  pub course_id: String,
  pub order: u32,
  pub deleted: bool,
}

#[derive(Clone, Debug)]
pub struct CourseRecord {
  pub id: String,
  pub deleted: bool,
}

/// In-memory content store; enough structure to exercise and test the
/// pipeline without a relational backend.
#[derive(Clone, Default)]
pub struct InMemoryContentStore {
  courses: Arc<RwLock<HashMap<String, CourseRecord>>>,
  topics: Arc<RwLock<HashMap<String, TopicRecord>>>,
  lessons: Arc<RwLock<HashMap<String, LessonRecord>>>,
}

impl InMemoryContentStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn insert_course(&self, course: CourseRecord) {
    self.courses.write().await.insert(course.id.clone(), course);
  }

  pub async fn insert_topic(&self, topic: TopicRecord) {
    self.topics.write().await.insert(topic.id.clone(), topic);
  }

  pub async fn insert_lesson(&self, lesson: LessonRecord) {
    self.lessons.write().await.insert(lesson.id.clone(), lesson);
  }

  fn lesson_body(lesson: &LessonRecord) -> String {
    let mut fragments: Vec<&Fragment> =
      lesson.fragments.iter().filter(|f| !f.deleted).collect();
    fragments.sort_by_key(|f| f.order);
    fragments
      .iter()
      .map(|f| f.body.as_str())
      .collect::<Vec<_>>()
      .join(FRAGMENT_SEPARATOR)
  }

  async fn lessons_of_topic(&self, topic_id: &str) -> Vec<LessonRecord> {
    let lessons = self.lessons.read().await;
    let mut out: Vec<LessonRecord> = lessons
      .values()
      .filter(|l| l.topic_id == topic_id && !l.deleted)
      .cloned()
      .collect();
    out.sort_by_key(|l| l.order);
    out
  }

  fn finish(scope: &'static str, id: &str, text: String) -> Result<String, PipelineError> {
    if text.trim().is_empty() {
      return Err(PipelineError::EmptyContent { scope, id: id.to_string() });
    }
    Ok(text)
  }
}

#[async_trait]
impl ContentSource for InMemoryContentStore {
  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn lesson_text(&self, id: &str) -> Result<String, PipelineError> {
    let lesson = {
      let lessons = self.lessons.read().await;
      lessons.get(id).filter(|l| !l.deleted).cloned()
    };
    let Some(lesson) = lesson else {
      return Err(PipelineError::NotFound { scope: "lesson", id: id.to_string() });
    };
    Self::finish("lesson", id, Self::lesson_body(&lesson))
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn topic_text(&self, id: &str) -> Result<String, PipelineError> {
    let exists = {
      let topics = self.topics.read().await;
      topics.get(id).map(|t| !t.deleted).unwrap_or(false)
    };
    if !exists {
      return Err(PipelineError::NotFound { scope: "topic", id: id.to_string() });
    }
    let parts: Vec<String> = self
      .lessons_of_topic(id)
      .await
      .iter()
      .map(Self::lesson_body)
      .filter(|s| !s.trim().is_empty())
      .collect();
    Self::finish("topic", id, parts.join(FRAGMENT_SEPARATOR))
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn course_text(&self, id: &str) -> Result<String, PipelineError> {
    let exists = {
      let courses = self.courses.read().await;
      courses.get(id).map(|c| !c.deleted).unwrap_or(false)
    };
    if !exists {
      return Err(PipelineError::NotFound { scope: "course", id: id.to_string() });
    }
    let mut topics: Vec<TopicRecord> = {
      let topics = self.topics.read().await;
      topics.values().filter(|t| t.course_id == id && !t.deleted).cloned().collect()
    };
    topics.sort_by_key(|t| t.order);

    let mut parts: Vec<String> = Vec::new();
    for topic in &topics {
      for lesson in self.lessons_of_topic(&topic.id).await {
        let body = Self::lesson_body(&lesson);
        if !body.trim().is_empty() {
          parts.push(body);
        }
      }
    }
    Self::finish("course", id, parts.join(FRAGMENT_SEPARATOR))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fragment(order: u32, body: &str) -> Fragment {
    Fragment { order, body: body.into(), deleted: false }
  }

  async fn seeded_store() -> InMemoryContentStore {
    let store = InMemoryContentStore::new();
    store.insert_course(CourseRecord { id: "c1".into(), deleted: false }).await;
    store
      .insert_topic(TopicRecord { id: "t2".into(), course_id: "c1".into(), order: 2, deleted: false })
      .await;
    store
      .insert_topic(TopicRecord { id: "t1".into(), course_id: "c1".into(), order: 1, deleted: false })
      .await;
    store
      .insert_lesson(LessonRecord {
        id: "l1".into(),
        topic_id: "t1".into(),
        order: 1,
        deleted: false,
        fragments: vec![
          fragment(2, "second block"),
          fragment(1, "first block"),
          Fragment { order: 3, body: "gone".into(), deleted: true },
        ],
      })
      .await;
    store
      .insert_lesson(LessonRecord {
        id: "l2".into(),
        topic_id: "t2".into(),
        order: 1,
        deleted: false,
        fragments: vec![fragment(1, "later topic block")],
      })
      .await;
    store
  }

  #[tokio::test]
  async fn lesson_text_orders_fragments_and_skips_deleted() {
    let store = seeded_store().await;
    let text = store.lesson_text("l1").await.expect("text");
    assert_eq!(text, "first block\n\nsecond block");
  }

  #[tokio::test]
  async fn course_text_honors_topic_order() {
    let store = seeded_store().await;
    let text = store.course_text("c1").await.expect("text");
    assert_eq!(text, "first block\n\nsecond block\n\nlater topic block");
  }

  #[tokio::test]
  async fn missing_scope_is_not_found() {
    let store = seeded_store().await;
    let err = store.lesson_text("nope").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { scope: "lesson", .. }));
    let err = store.course_text("nope").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { scope: "course", .. }));
  }

  #[tokio::test]
  async fn blank_scope_is_empty_content() {
    let store = seeded_store().await;
    store
      .insert_lesson(LessonRecord {
        id: "l3".into(),
        topic_id: "t1".into(),
        order: 2,
        deleted: false,
        fragments: vec![fragment(1, "   ")],
      })
      .await;
    let err = store.lesson_text("l3").await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyContent { scope: "lesson", .. }));
  }
}
