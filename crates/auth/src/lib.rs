//! `sessiongate-auth`: authentication and session boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: backends plug
//! in through the [`UserDirectory`] and [`SessionStore`] traits.

pub mod directory;
pub mod gate;
pub mod password;
pub mod provider;
pub mod session;

pub use directory::{DirectoryError, FixedUserDirectory, UserDirectory};
pub use gate::{AuthDecision, AuthGate, SessionPrincipal};
pub use password::{BcryptHasher, PasswordHasher};
pub use provider::{AuthError, AuthProvider, Credentials};
pub use session::{
    CookieDirective, CookieSettings, InMemorySessionStore, RequestSession, SessionError,
    SessionManager, SessionRecord, SessionStore, SessionStoreError, SessionToken,
    TokenGenerationError, USER_EMAIL_KEY, USER_ID_KEY,
};
