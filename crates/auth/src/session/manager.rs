//! Request-scoped session operations.
//!
//! A [`RequestSession`] is created once per inbound request by
//! [`SessionManager::load`] and carried explicitly through the request (the
//! HTTP layer keeps it in request extensions). Nothing here is process-global,
//! so concurrent requests never observe each other's session state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::store::{SessionStore, SessionStoreError, expiry_after};
use super::token::SessionToken;

/// Session attribute holding the authenticated identity's id.
pub const USER_ID_KEY: &str = "userID";

/// Session attribute holding the authenticated identity's email.
pub const USER_EMAIL_KEY: &str = "userEmail";

/// Default absolute session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bound on a single session store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The operation needs a session token established for this request.
    #[error("no active session")]
    NoSession,

    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store operation timed out")]
    Timeout,
}

impl From<SessionStoreError> for SessionError {
    fn from(value: SessionStoreError) -> Self {
        match value {
            SessionStoreError::NotFound => Self::NoSession,
            SessionStoreError::Unavailable(msg) => Self::Unavailable(msg),
            SessionStoreError::Timeout => Self::Timeout,
            SessionStoreError::TokenGeneration(e) => Self::Unavailable(e.to_string()),
        }
    }
}

/// Cookie attributes the transport applies when rendering a
/// [`CookieDirective`]. Cookies are always `HttpOnly`, `SameSite=Lax`, `Path=/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            secure: false,
        }
    }
}

/// What the response must do with the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    /// The token did not change during this request.
    Unchanged,
    /// Send the (new) token, persisting until `expires_at`.
    Issue {
        token: SessionToken,
        expires_at: DateTime<Utc>,
    },
    /// The session was destroyed; expire the client's cookie.
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Status {
    #[default]
    Unmodified,
    Renewed,
    Destroyed,
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<SessionToken>,
    attributes: HashMap<String, String>,
    expires_at: Option<DateTime<Utc>>,
    status: Status,
}

/// Per-request session context. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct RequestSession {
    state: Arc<Mutex<SessionState>>,
}

impl RequestSession {
    /// A request that carried no (valid) session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    fn established(
        token: SessionToken,
        attributes: HashMap<String, String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                token: Some(token),
                attributes,
                expires_at: Some(expires_at),
                status: Status::Unmodified,
            })),
        }
    }

    /// Whether a token is bound to this request.
    pub fn has_token(&self) -> bool {
        self.lock().token.is_some()
    }

    // The state is plain data; a panic elsewhere cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Stateless façade over a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    store_timeout: Duration,
    cookie: CookieSettings,
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .field("store_timeout", &self.store_timeout)
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_SESSION_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            cookie: CookieSettings::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_cookie_settings(mut self, cookie: CookieSettings) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cookie_settings(&self) -> &CookieSettings {
        &self.cookie
    }

    /// Begin a request: resolve the client's cookie value (if any).
    ///
    /// Unknown, malformed and expired tokens all yield an anonymous session.
    /// A store failure is an error, never a silent "anonymous".
    pub async fn load(&self, cookie_value: Option<&str>) -> Result<RequestSession, SessionError> {
        let Some(token) = cookie_value.and_then(SessionToken::parse) else {
            return Ok(RequestSession::anonymous());
        };

        match self.bounded("session.load", self.store.load(&token)).await? {
            Some(record) => Ok(RequestSession::established(
                token,
                record.attributes,
                record.expires_at,
            )),
            None => {
                debug!(op = "session.load", "client presented an unknown or expired token");
                Ok(RequestSession::anonymous())
            }
        }
    }

    /// Invalidate the current token (if any) and bind a fresh, empty session.
    ///
    /// Must run right before writing attributes on login, so a token planted
    /// by someone else can never become authenticated.
    pub async fn renew_token(&self, session: &RequestSession) -> Result<(), SessionError> {
        let previous = session.lock().token.clone();
        if let Some(previous) = previous {
            self.bounded("session.renew", self.store.destroy(&previous))
                .await?;
        }

        let token = self
            .bounded("session.renew", self.store.create(self.ttl))
            .await?;

        let mut state = session.lock();
        state.token = Some(token);
        state.attributes.clear();
        state.expires_at = Some(expiry_after(Utc::now(), self.ttl));
        state.status = Status::Renewed;
        Ok(())
    }

    /// Write one attribute onto the current session.
    pub async fn put(
        &self,
        session: &RequestSession,
        key: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        let token = session.lock().token.clone().ok_or(SessionError::NoSession)?;

        self.bounded("session.put", self.store.put(&token, key, value))
            .await?;

        session
            .lock()
            .attributes
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Bind `attributes` to a fresh token: [`renew_token`](Self::renew_token)
    /// followed by a single batched write.
    ///
    /// All or nothing. If any step fails the fresh token is destroyed and the
    /// client's cookie is cleared, so a failed login never leaves a partially
    /// established session behind.
    pub async fn establish(
        &self,
        session: &RequestSession,
        attributes: &[(&str, &str)],
    ) -> Result<(), SessionError> {
        self.renew_token(session).await?;

        let token = session.lock().token.clone();
        let written = match token {
            Some(token) => {
                self.bounded("session.establish", self.store.put_many(&token, attributes))
                    .await
            }
            None => Err(SessionError::NoSession),
        };

        if let Err(e) = written {
            self.abandon(session).await;
            return Err(e);
        }

        session.lock().attributes.extend(
            attributes
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        Ok(())
    }

    /// Forget the request's token locally and remove it from the store on a
    /// best-effort basis. The cookie is cleared even if the store call fails.
    async fn abandon(&self, session: &RequestSession) {
        let token = {
            let mut state = session.lock();
            state.attributes.clear();
            state.expires_at = None;
            state.status = Status::Destroyed;
            state.token.take()
        };

        if let Some(token) = token {
            if let Err(e) = self.bounded("session.abandon", self.store.destroy(&token)).await {
                warn!(op = "session.abandon", error = %e, "abandoned session left to expire");
            }
        }
    }

    /// Read one attribute; empty when there is no session or no such key.
    pub fn get_string(&self, session: &RequestSession, key: &str) -> String {
        session.lock().attributes.get(key).cloned().unwrap_or_default()
    }

    /// Remove the session entirely. Idempotent.
    pub async fn destroy(&self, session: &RequestSession) -> Result<(), SessionError> {
        let token = session.lock().token.clone();
        if let Some(token) = token {
            self.bounded("session.destroy", self.store.destroy(&token))
                .await?;
        }

        let mut state = session.lock();
        state.token = None;
        state.attributes.clear();
        state.expires_at = None;
        state.status = Status::Destroyed;
        Ok(())
    }

    /// The cookie change this request's session operations require.
    pub fn cookie_directive(&self, session: &RequestSession) -> CookieDirective {
        let state = session.lock();
        match (state.status, &state.token, state.expires_at) {
            (Status::Renewed, Some(token), Some(expires_at)) => CookieDirective::Issue {
                token: token.clone(),
                expires_at,
            },
            (Status::Destroyed, _, _) => CookieDirective::Clear,
            _ => CookieDirective::Unchanged,
        }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, SessionStoreError>>,
    ) -> Result<T, SessionError> {
        let outcome = tokio::time::timeout(self.store_timeout, call)
            .await
            .unwrap_or(Err(SessionStoreError::Timeout));

        outcome.map_err(|e| {
            if !matches!(e, SessionStoreError::NotFound) {
                error!(op, error = %e, "session store call failed");
            }
            SessionError::from(e)
        })
    }
}
