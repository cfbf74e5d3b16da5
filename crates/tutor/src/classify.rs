//! Answer-mode classification.
//!
//! A best-effort text heuristic, not a factuality check: it decides
//! which label an answer carries, nothing more. Pure function, no store
//! or provider access.

use crate::prompt::OUTSIDE_MARKER;
use coursepilot_core::chat::AnswerMode;
use coursepilot_core::passage::Passage;

/// Classify an answer as course-grounded or outside material.
///
/// Decision order:
/// 1. the outside marker anywhere in the text (case-insensitive) wins;
/// 2. a passage title appearing verbatim in the text;
/// 3. a passage page number referenced as "page N";
/// 4. any retrieved passages at all;
/// 5. otherwise outside material.
pub fn classify(answer: &str, passages: &[Passage]) -> AnswerMode {
    let lowered = answer.to_lowercase();

    if lowered.contains(&OUTSIDE_MARKER.to_lowercase()) {
        return AnswerMode::OutsideMaterial;
    }

    for passage in passages {
        if !passage.source_title.is_empty()
            && lowered.contains(&passage.source_title.to_lowercase())
        {
            return AnswerMode::CourseGrounded;
        }
        if let Some(page) = passage.page_number
            && lowered.contains(&format!("page {page}"))
        {
            return AnswerMode::CourseGrounded;
        }
    }

    if !passages.is_empty() {
        return AnswerMode::CourseGrounded;
    }

    AnswerMode::OutsideMaterial
}
