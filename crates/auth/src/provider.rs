//! Credential verification against a pluggable user directory.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use sessiongate_core::Identity;

use crate::{DirectoryError, PasswordHasher, UserDirectory};

/// Default bound on a single directory lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Verified against when the email is unknown, so both rejection paths pay
/// for one bcrypt comparison. Same cost as the stored hashes (10).
const UNKNOWN_USER_HASH: &str = "$2b$10$VORjfExjjXA2q6.MsYusjerzi1HsjoJ9IWIaQsa.LxhPQmvqcz7Ly";

/// Login input. Never stored.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The directory could not be consulted (outage, timeout).
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

/// Resolves credentials to an identity.
///
/// Swapping the directory implementation does not change behavior.
#[derive(Clone)]
pub struct AuthProvider {
    directory: Arc<dyn UserDirectory>,
    hasher: Arc<dyn PasswordHasher>,
    lookup_timeout: Duration,
}

impl AuthProvider {
    pub fn new(directory: Arc<dyn UserDirectory>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            directory,
            hasher,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Authenticate `credentials`.
    ///
    /// Succeeds iff the email exists and the password verifies against the
    /// stored hash. Directory outages surface as [`AuthError::Unavailable`],
    /// never as a rejection.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        const OP: &str = "auth.authenticate";

        let lookup = tokio::time::timeout(
            self.lookup_timeout,
            self.directory.lookup_by_email(&credentials.email),
        )
        .await
        .unwrap_or(Err(DirectoryError::Timeout));

        let found = match lookup {
            Ok(found) => found,
            Err(e) => {
                error!(op = OP, error = %e, "user lookup failed");
                return Err(AuthError::Unavailable(e.to_string()));
            }
        };

        let stored_hash = found
            .as_ref()
            .map(|identity| identity.password_hash.clone())
            .unwrap_or_else(|| UNKNOWN_USER_HASH.to_string());
        let verified = self.verify(credentials.password.clone(), stored_hash).await?;

        match found {
            Some(identity) if verified => {
                info!(op = OP, user_id = %identity.id, "authentication succeeded");
                Ok(identity)
            }
            _ => {
                warn!(op = OP, email = %credentials.email, "authentication rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    // bcrypt is CPU-bound; keep it off the async workers.
    async fn verify(&self, plaintext: String, stored_hash: String) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &stored_hash))
            .await
            .map_err(|e| AuthError::Unavailable(format!("password verification aborted: {e}")))
    }
}
