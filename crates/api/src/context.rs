use sessiongate_auth::SessionPrincipal;

/// Principal context for a request (the identity recorded in its session).
///
/// Present on every protected route; inserted by the auth gate middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: String,
    email: String,
}

impl PrincipalContext {
    pub fn new(principal: SessionPrincipal) -> Self {
        Self {
            user_id: principal.user_id,
            email: principal.email,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}
