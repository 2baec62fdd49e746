use serde::Serialize;

use sessiongate_core::DomainError;

use crate::session::{RequestSession, SessionManager, USER_EMAIL_KEY, USER_ID_KEY};

/// The authenticated caller, as recorded in its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPrincipal {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticated(SessionPrincipal),
    Rejected,
}

impl AuthDecision {
    pub fn into_result(self) -> Result<SessionPrincipal, DomainError> {
        match self {
            Self::Authenticated(principal) => Ok(principal),
            Self::Rejected => Err(DomainError::Unauthorized),
        }
    }
}

/// Admission check for protected operations.
///
/// - No IO: the session was loaded when the request began
/// - No panics
/// - Authenticated iff the session carries a non-empty user id
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthGate;

impl AuthGate {
    pub fn new() -> Self {
        Self
    }

    pub fn authorize(&self, sessions: &SessionManager, session: &RequestSession) -> AuthDecision {
        let user_id = sessions.get_string(session, USER_ID_KEY);
        if user_id.is_empty() {
            return AuthDecision::Rejected;
        }

        AuthDecision::Authenticated(SessionPrincipal {
            user_id,
            email: sessions.get_string(session, USER_EMAIL_KEY),
        })
    }
}
