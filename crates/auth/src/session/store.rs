use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::{SessionToken, TokenGenerationError};

/// Server-side state behind a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub attributes: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// An empty record expiring `ttl` from `now`.
    pub fn new(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            attributes: HashMap::new(),
            expires_at: expiry_after(now, ttl),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// `now + ttl`, saturating for TTLs chrono cannot represent.
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The token is unknown or its record expired.
    #[error("session not found")]
    NotFound,

    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store operation timed out")]
    Timeout,

    #[error(transparent)]
    TokenGeneration(#[from] TokenGenerationError),
}

/// Keyed, TTL-bearing session storage.
///
/// Implementations must be safe under concurrent access from many in-flight
/// requests. Expired records behave exactly like records that never existed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate a fresh token bound to an empty record living for `ttl`.
    async fn create(&self, ttl: Duration) -> Result<SessionToken, SessionStoreError>;

    /// Load the record behind `token`; `None` if absent or expired.
    async fn load(&self, token: &SessionToken) -> Result<Option<SessionRecord>, SessionStoreError>;

    /// Set several attributes in one write: either all land or none do.
    /// Fails with [`SessionStoreError::NotFound`] if the token is absent or
    /// expired. Does not extend the expiry.
    async fn put_many(
        &self,
        token: &SessionToken,
        attributes: &[(&str, &str)],
    ) -> Result<(), SessionStoreError>;

    /// Set one attribute; see [`SessionStore::put_many`].
    async fn put(
        &self,
        token: &SessionToken,
        key: &str,
        value: &str,
    ) -> Result<(), SessionStoreError> {
        self.put_many(token, &[(key, value)]).await
    }

    /// Remove the record. Destroying an absent token is not an error.
    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionStoreError>;
}
