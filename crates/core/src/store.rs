//! Storage traits — persistence contracts for the turn pipeline.
//!
//! Implementations live in the store crate (SQLite via sqlx). The
//! pipeline only ever talks to these traits so tests can run against
//! in-memory databases or stubs.

use crate::chat::{AnswerMode, ChatMessage, ChatThread, Sender};
use crate::error::StoreError;
use crate::identity::{Enrollment, SessionIdentity};
use crate::passage::Passage;
use async_trait::async_trait;
use chrono::NaiveDate;

/// A message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub thread_id: String,
    pub sender: Sender,
    pub text: String,
    /// Only assistant messages carry a label.
    pub answer_mode: Option<AnswerMode>,
    /// Only assistant messages carry passage references.
    pub passage_ids: Vec<String>,
}

impl NewMessage {
    /// A plain user message.
    pub fn user(thread_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            sender: Sender::User,
            text: text.into(),
            answer_mode: None,
            passage_ids: Vec::new(),
        }
    }

    /// An assistant message with its label and passage references.
    pub fn assistant(
        thread_id: impl Into<String>,
        text: impl Into<String>,
        answer_mode: AnswerMode,
        passage_ids: Vec<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            sender: Sender::Assistant,
            text: text.into(),
            answer_mode: Some(answer_mode),
            passage_ids,
        }
    }
}

/// Thread and message persistence.
///
/// Every thread-scoped read or delete takes the caller's user id and
/// treats an ownership miss exactly like a missing row.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Create a new thread. The owner is immutable afterwards.
    async fn create_thread(
        &self,
        course_id: &str,
        user_id: &str,
        title: Option<&str>,
    ) -> Result<ChatThread, StoreError>;

    /// Get a thread with derived message count and preview, or None if
    /// it does not exist *for this user*.
    async fn get_thread(
        &self,
        thread_id: &str,
        user_id: &str,
    ) -> Result<Option<ChatThread>, StoreError>;

    /// List a user's threads for a course, newest first. Returns the
    /// page and the total count.
    async fn list_threads(
        &self,
        user_id: &str,
        course_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<ChatThread>, u64), StoreError>;

    /// Delete a thread and all its messages. Returns false when the
    /// thread does not exist for this user.
    async fn delete_thread(&self, thread_id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Persist a message and return the stored record.
    async fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// List messages in creation order.
    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    /// Set the thread title.
    async fn set_title(&self, thread_id: &str, title: &str) -> Result<(), StoreError>;
}

/// Read access to the indexed knowledge store.
///
/// Passages are written by the ingestion pipeline; the turn pipeline
/// only queries them.
#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Nearest passages to a query embedding within one course, ranked
    /// by descending similarity. Passages without an embedding are
    /// excluded. An unindexed course yields an empty list.
    async fn search_by_embedding(
        &self,
        course_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Passage>, StoreError>;

    /// Batch-fetch passages by id, in the store's return order.
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Passage>, StoreError>;

    /// Whether the course has any embedded passages at all.
    async fn has_content(&self, course_id: &str) -> Result<bool, StoreError>;

    /// Upsert a passage (ingestion side; not called during a turn).
    async fn insert_passage(&self, passage: Passage) -> Result<String, StoreError>;
}

/// Per-user-per-course-per-day token accounting.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Tokens consumed on the given day. Zero when no row exists.
    async fn usage_on(
        &self,
        user_id: &str,
        course_id: &str,
        day: NaiveDate,
    ) -> Result<u32, StoreError>;

    /// Atomically insert-or-increment the day's counter and return the
    /// new total. Concurrent calls for the same key must both land.
    async fn add_usage(
        &self,
        user_id: &str,
        course_id: &str,
        day: NaiveDate,
        tokens: u32,
    ) -> Result<u32, StoreError>;
}

/// The identity collaborator — session and enrollment lookups.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve a session credential to a user, or None if the session
    /// is unknown or expired.
    async fn validate_session(
        &self,
        session_token: &str,
    ) -> Result<Option<SessionIdentity>, StoreError>;

    /// The user's enrollment in the course, or None.
    async fn get_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, StoreError>;
}
