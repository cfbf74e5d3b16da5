//! Thread and message domain types.
//!
//! These are the persisted conversation records: a user opens a thread
//! scoped to a course, sends messages, and receives assistant messages
//! labeled with an answer mode and the passage ids that informed them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who sent a persisted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
        }
    }

    /// Parse from the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Self::User),
            "ASSISTANT" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Whether an assistant answer was grounded in course material.
///
/// Assigned by a best-effort heuristic over the answer text and the
/// retrieved passages. Not a guarantee of factual grounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerMode {
    CourseGrounded,
    OutsideMaterial,
}

impl AnswerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CourseGrounded => "COURSE_GROUNDED",
            Self::OutsideMaterial => "OUTSIDE_MATERIAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COURSE_GROUNDED" => Some(Self::CourseGrounded),
            "OUTSIDE_MATERIAL" => Some(Self::OutsideMaterial),
            _ => None,
        }
    }
}

/// A conversation thread owned by one user within one course.
///
/// The owner is immutable after creation. The title is set at most once,
/// automatically from the first user message unless supplied explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    /// Unique thread ID.
    pub id: String,

    /// The course this thread is scoped to.
    pub course_id: String,

    /// The owning user. Immutable.
    pub user_id: String,

    /// Optional title, derived from the first message if never supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Derived: number of messages in the thread.
    #[serde(default)]
    pub message_count: u64,

    /// Derived: first 100 characters of the most recent message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
}

/// A single persisted message within a thread.
///
/// Messages are strictly ordered by creation timestamp. Only assistant
/// messages carry an answer mode and passage references. Messages are
/// exclusively owned by their thread and destroyed with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID.
    pub id: String,

    /// The thread this message belongs to.
    pub thread_id: String,

    /// Who sent it.
    pub sender: Sender,

    /// The text body.
    pub text: String,

    /// Grounding label. Only set on assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_mode: Option<AnswerMode>,

    /// Ids of the passages retrieved for this answer. Only set on
    /// assistant messages; citations are reconstructed from these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passage_ids: Vec<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
