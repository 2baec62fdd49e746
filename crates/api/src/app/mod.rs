//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend selection and the services handlers call
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping
//! - `errors.rs`: consistent error responses

use std::any::Any;
use std::sync::Arc;

use axum::{Extension, Router, http::StatusCode, response::Response, routing::get};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let gate_state = middleware::GateState {
        sessions: services.sessions.clone(),
        gate: services.gate,
    };

    // Protected routes: the gate runs after the session is loaded and only
    // for routes that matched, so unknown paths still 404.
    let protected = routes::protected_router().route_layer(axum::middleware::from_fn_with_state(
        gate_state,
        middleware::auth_gate_middleware,
    ));

    let api = routes::public_router().merge(protected);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", api)
        .layer(Extension(services.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TimeoutLayer::new(services.request_timeout))
                .layer(axum::middleware::from_fn_with_state(
                    services.sessions.clone(),
                    middleware::session_middleware,
                )),
        )
}

/// A panicking handler answers 500; the connection and the server survive.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    tracing::error!(op = "http.panic", panic = %detail, "handler panicked");

    errors::json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}
