//! Passage and citation types.
//!
//! A passage is a retrievable unit of indexed course content with an
//! embedding vector. The core never mutates passages; it reads them by
//! similarity query or by id batch-lookup. Citations are derived from
//! passages on demand, never persisted as their own entity.

use serde::{Deserialize, Serialize};

/// Maximum snippet length before truncation, in characters.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// A snapshot of an indexed course passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Unique passage ID.
    pub id: String,

    /// The content file this passage was chunked from.
    pub content_file_id: String,

    /// The course this passage belongs to.
    pub course_id: String,

    /// The passage text.
    pub text: String,

    /// Position of this passage within its content file.
    pub position: u32,

    /// Display title of the source (falls back to the filename).
    pub source_title: String,

    /// Page number in the source document, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    /// Section heading in the source document, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_heading: Option<String>,

    /// Similarity score in [0, 1] set by retrieval (1 = identical).
    #[serde(default)]
    pub similarity: f32,

    /// Embedding vector (stored as a blob, never serialized out).
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

/// A user-facing pointer from an answer back to a source passage.
///
/// Always reconstructible from a passage id, so only passage-id lists
/// are persisted on assistant messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub passage_id: String,
    pub content_file_id: String,
    pub source_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_heading: Option<String>,
    /// Passage text, truncated to 200 characters plus an ellipsis.
    pub snippet: String,
}

impl Citation {
    /// Build a citation from a passage snapshot.
    pub fn from_passage(passage: &Passage) -> Self {
        Self {
            passage_id: passage.id.clone(),
            content_file_id: passage.content_file_id.clone(),
            source_title: passage.source_title.clone(),
            page_number: passage.page_number,
            section_heading: passage.section_heading.clone(),
            snippet: truncate_snippet(&passage.text),
        }
    }
}

/// Truncate passage text to the snippet limit, appending an ellipsis
/// only when the source text actually exceeds it.
pub fn truncate_snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_MAX_CHARS {
        let truncated: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
