//! User directory abstraction: resolves an email to a stored identity.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use sessiongate_core::{Identity, UserId};

/// Directory backend failure.
///
/// "No such user" is not an error: lookups return `Ok(None)` for it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),

    #[error("user directory lookup timed out")]
    Timeout,
}

/// Email → identity resolution, swappable at startup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Identity>, DirectoryError>;
}

/// Email of the built-in demo identity.
pub const FIXED_USER_EMAIL: &str = "test@example.com";

/// bcrypt hash of the built-in demo identity's password (`password123`).
pub const FIXED_USER_PASSWORD_HASH: &str =
    "$2a$10$WhWf0qQzwtD8fz6p/Ge.2e8Y6WhZRN/vopNJXofJ7vEaG4KEukRPS";

/// Single-record directory for environments without a database.
///
/// This is a demo/test fixture, not a security feature.
#[derive(Debug, Clone)]
pub struct FixedUserDirectory {
    identity: Identity,
}

impl FixedUserDirectory {
    /// The built-in `test@example.com` / `password123` identity.
    pub fn new() -> Self {
        Self::with_identity(Identity::new(
            UserId::new(),
            FIXED_USER_EMAIL,
            FIXED_USER_PASSWORD_HASH,
            Utc::now(),
        ))
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Default for FixedUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for FixedUserDirectory {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Identity>, DirectoryError> {
        if email == self.identity.email {
            tracing::debug!(op = "directory.fixed.lookup_by_email", "identity found");
            return Ok(Some(self.identity.clone()));
        }

        tracing::debug!(op = "directory.fixed.lookup_by_email", "identity not found");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BcryptHasher, PasswordHasher};

    #[tokio::test]
    async fn fixed_directory_resolves_only_its_email() {
        let dir = FixedUserDirectory::new();

        let found = dir.lookup_by_email(FIXED_USER_EMAIL).await.unwrap();
        assert_eq!(found.as_ref().map(|i| i.email.as_str()), Some(FIXED_USER_EMAIL));

        assert!(dir.lookup_by_email("other@example.com").await.unwrap().is_none());
        assert!(dir.lookup_by_email("TEST@example.com").await.unwrap().is_none());
    }

    #[test]
    fn fixed_identity_hash_matches_demo_password() {
        let dir = FixedUserDirectory::new();
        assert!(BcryptHasher.verify("password123", &dir.identity().password_hash));
    }
}
