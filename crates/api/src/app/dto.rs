use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sessiongate_core::{CatalogItem, Identity};

use crate::context::PrincipalContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Missing fields deserialize as empty so validation, not JSON parsing,
/// decides what an acceptable entry is.
#[derive(Debug, Deserialize)]
pub struct DataRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    /// Known at login; the session only records id and email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Identity> for UserResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.clone(),
            created_at: Some(identity.created_at),
        }
    }
}

impl From<&PrincipalContext> for UserResponse {
    fn from(principal: &PrincipalContext) -> Self {
        Self {
            id: principal.user_id().to_string(),
            email: principal.email().to_string(),
            created_at: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogItemResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub disabled: bool,
}

impl From<CatalogItem> for CatalogItemResponse {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title,
            description: item.description,
            disabled: item.disabled,
        }
    }
}
