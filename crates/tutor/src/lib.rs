//! The CoursePilot turn pipeline.
//!
//! Everything between "a student sent a message" and "the answer is
//! stored and returned": daily token budgeting, course-scoped passage
//! retrieval, prompt assembly, answer-mode classification, citation
//! building, and the `ChatService` orchestrator that sequences them.
//!
//! The pipeline talks to its collaborators only through the traits in
//! `coursepilot-core`, so it runs identically against the production
//! SQLite store or in-memory test doubles.

pub mod budget;
pub mod citation;
pub mod classify;
pub mod prompt;
pub mod retrieval;
pub mod service;

pub use budget::{estimate_tokens, BudgetLedger, RESPONSE_MARGIN};
pub use classify::classify;
pub use prompt::{DEFAULT_SYSTEM_PROMPT, HISTORY_WINDOW, OUTSIDE_MARKER};
pub use retrieval::{format_context, RetrievalEngine};
pub use service::{ChatService, MessageWithCitations, TurnOutcome};
