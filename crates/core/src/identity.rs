//! User identity as resolved by a user directory.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::UserId;

/// An identity record owned by a user directory backend.
///
/// Identities are read-only to the session pipeline: they are created out of
/// band (seed data, registration) and never updated here.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    /// Stored password hash (bcrypt). Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            password_hash: password_hash.into(),
            created_at,
        }
    }
}

impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}
