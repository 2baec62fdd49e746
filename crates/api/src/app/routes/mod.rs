use axum::{
    Router,
    routing::{get, post},
};

pub mod auth;
pub mod catalog;
pub mod data;
pub mod system;

/// Endpoints open to anonymous callers.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/catalog", get(catalog::list_catalog))
}

/// Endpoints that require an authenticated session (gate applied by caller).
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/data", post(data::post_data))
}
