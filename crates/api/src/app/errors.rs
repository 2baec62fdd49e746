use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use sessiongate_auth::{AuthError, SessionError};
use sessiongate_core::DomainError;
use sessiongate_infra::repository::RepositoryError;

/// Every failure a handler or middleware can surface.
///
/// Caller mistakes map to 4xx and are logged at warn; backend failures map
/// to 5xx, are logged at error and never echo backend details to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

const UNAVAILABLE: &str = "service temporarily unavailable";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(DomainError::Validation(msg)) => {
                warn!(error = %msg, "request rejected");
                json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
            }
            ApiError::Domain(DomainError::InvalidId(msg)) => {
                warn!(error = %msg, "request rejected");
                json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
            }
            ApiError::Domain(DomainError::NotFound) => {
                json_error(StatusCode::NOT_FOUND, "not_found", "not found")
            }
            ApiError::Domain(DomainError::Unauthorized) => unauthorized(),
            ApiError::Auth(AuthError::InvalidCredentials) => json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "invalid email or password",
            ),
            ApiError::Auth(AuthError::Unavailable(msg)) => {
                error!(op = "auth.authenticate", error = %msg, "authentication backend failed");
                json_error(StatusCode::SERVICE_UNAVAILABLE, "auth_unavailable", UNAVAILABLE)
            }
            ApiError::Session(SessionError::NoSession) => {
                error!(op = "session", "session write without an established session");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "session_error", "session error")
            }
            ApiError::Session(SessionError::Unavailable(msg)) => {
                error!(op = "session", error = %msg, "session store failed");
                json_error(StatusCode::SERVICE_UNAVAILABLE, "session_unavailable", UNAVAILABLE)
            }
            ApiError::Session(SessionError::Timeout) => {
                error!(op = "session", "session store timed out");
                json_error(StatusCode::GATEWAY_TIMEOUT, "session_timeout", UNAVAILABLE)
            }
            ApiError::Repository(e @ RepositoryError::Unavailable { .. }) => {
                error!(op = e.op(), error = %e, "repository call failed");
                json_error(StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable", UNAVAILABLE)
            }
            ApiError::Repository(e @ RepositoryError::Timeout { .. }) => {
                error!(op = e.op(), "repository call timed out");
                json_error(StatusCode::GATEWAY_TIMEOUT, "backend_timeout", UNAVAILABLE)
            }
        }
    }
}

/// The single response every gate rejection produces.
pub fn unauthorized() -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (DomainError::validation("key cannot be empty").into(), StatusCode::BAD_REQUEST),
            (DomainError::Unauthorized.into(), StatusCode::UNAUTHORIZED),
            (AuthError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED),
            (AuthError::Unavailable("down".into()).into(), StatusCode::SERVICE_UNAVAILABLE),
            (SessionError::Timeout.into(), StatusCode::GATEWAY_TIMEOUT),
            (
                RepositoryError::Unavailable { op: "data.save", message: "down".into() }.into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
