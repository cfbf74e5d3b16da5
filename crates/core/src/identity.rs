//! Identity types returned by the identity collaborator.
//!
//! Authentication itself is out of scope: sessions and enrollments are
//! minted elsewhere. The core only resolves an opaque session credential
//! to a user, and checks enrollment presence for a course.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated user identity resolved from a session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A user's enrollment in a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
