//! Error types for the CoursePilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. The transport layer
//! translates these kinds into status codes; nothing here retries.

use thiserror::Error;

/// The top-level error type for all CoursePilot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No valid identity for the request. Surfaced, never retried.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The resource does not exist for this caller. Ownership misses
    /// are reported with this same kind so existence never leaks.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Daily token budget pre-check failed. Nothing was persisted.
    #[error("{message}")]
    BudgetExceeded { message: String },

    // --- Provider errors (generation or embedding upstream) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Storage errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A required collaborator is not wired up. Rejected before any work.
    #[error("Service unavailable: {0}")]
    NotConfigured(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
