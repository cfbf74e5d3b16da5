//! # CoursePilot Core
//!
//! Domain types, traits, and error definitions for the CoursePilot AI
//! tutoring backend. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod chat;
pub mod error;
pub mod identity;
pub mod passage;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use chat::{AnswerMode, ChatMessage, ChatThread, Sender};
pub use error::{Error, ProviderError, Result, StoreError};
pub use identity::{Enrollment, SessionIdentity};
pub use passage::{Citation, Passage};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, GenerationRequest, GenerationResponse, PromptMessage,
    Provider, Role, Usage,
};
pub use store::{BudgetStore, IdentityStore, NewMessage, PassageStore, ThreadStore};
