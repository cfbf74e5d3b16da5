//! SQLite persistence for CoursePilot.
//!
//! One database file holds conversation state (threads, messages), the
//! indexed knowledge base (passages with embedding blobs), the per-day
//! token ledger rows, and the identity tables the transport layer
//! authenticates against. A single `SqliteStore` implements all four
//! store traits from core.

pub mod sqlite;
pub mod vector;

pub use sqlite::SqliteStore;
