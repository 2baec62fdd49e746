use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};

use sessiongate_auth::{Credentials, RequestSession, USER_EMAIL_KEY, USER_ID_KEY};

use crate::app::dto::{LoginRequest, UserResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Authenticate, then bind the identity to a *fresh* session token.
///
/// The token is renewed before any attribute is written, so a token the
/// client held before logging in never becomes authenticated. If the session
/// cannot be fully established the attempt fails and the cookie is cleared.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let credentials = Credentials::new(body.email, body.password);
    let identity = services.auth.authenticate(&credentials).await?;

    let user_id = identity.id.to_string();
    services
        .sessions
        .establish(
            &session,
            &[
                (USER_ID_KEY, user_id.as_str()),
                (USER_EMAIL_KEY, identity.email.as_str()),
            ],
        )
        .await?;

    Ok(Json(UserResponse::from(&identity)))
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<StatusCode, ApiError> {
    services.sessions.destroy(&session).await?;
    tracing::info!(op = "auth.logout", user_id = %principal.user_id(), "session destroyed");
    Ok(StatusCode::OK)
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> Json<UserResponse> {
    Json(UserResponse::from(&principal))
}
