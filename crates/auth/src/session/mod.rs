//! Server-side sessions: token issuance, storage contract and the
//! request-scoped manager.

pub mod manager;
pub mod memory;
pub mod store;
pub mod token;

pub use manager::{
    CookieDirective, CookieSettings, DEFAULT_SESSION_TTL, DEFAULT_STORE_TIMEOUT, RequestSession,
    SessionError, SessionManager, USER_EMAIL_KEY, USER_ID_KEY,
};
pub use memory::InMemorySessionStore;
pub use store::{SessionRecord, SessionStore, SessionStoreError};
pub use token::{SessionToken, TokenGenerationError};
