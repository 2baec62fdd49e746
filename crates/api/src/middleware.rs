use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use sessiongate_auth::{
    AuthDecision, AuthGate, CookieDirective, CookieSettings, RequestSession, SessionManager,
};

use crate::app::errors::{self, ApiError};
use crate::context::PrincipalContext;

/// Loads the caller's session before the handler runs and writes the cookie
/// change the handler caused (login, logout) onto the response.
///
/// Every route sits behind this layer; the [`RequestSession`] it inserts is
/// the only session state a handler sees.
pub async fn session_middleware(
    State(sessions): State<SessionManager>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let cookie_name = &sessions.cookie_settings().name;
    let token = cookie_value(req.headers(), cookie_name).map(str::to_owned);

    let session = match sessions.load(token.as_deref()).await {
        Ok(session) => session,
        Err(e) => return ApiError::from(e).into_response(),
    };
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    let directive = sessions.cookie_directive(&session);
    let Some(set_cookie) = render_set_cookie(sessions.cookie_settings(), &directive, Utc::now())
    else {
        return response;
    };

    match HeaderValue::from_str(&set_cookie) {
        Ok(value) => {
            let headers = response.headers_mut();
            headers.append(header::SET_COOKIE, value);
            headers.append(header::VARY, HeaderValue::from_static("Cookie"));
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(r#"no-cache="Set-Cookie""#),
            );
            response
        }
        Err(e) => {
            error!(op = "session.cookie", error = %e, "session cookie is not a valid header value");
            errors::json_error(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "session_error",
                "session error",
            )
        }
    }
}

#[derive(Clone)]
pub struct GateState {
    pub sessions: SessionManager,
    pub gate: AuthGate,
}

/// Admits a request to a protected route only if its session is
/// authenticated; otherwise answers 401 without invoking the handler.
pub async fn auth_gate_middleware(
    State(state): State<GateState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = req
        .extensions()
        .get::<RequestSession>()
        .cloned()
        .unwrap_or_default();

    match state.gate.authorize(&state.sessions, &session) {
        AuthDecision::Authenticated(principal) => {
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).await
        }
        AuthDecision::Rejected => {
            info!(path = %req.uri().path(), "unauthenticated request rejected");
            errors::unauthorized()
        }
    }
}

/// Value of the first cookie called `name` across all `Cookie` headers.
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Set-Cookie` value for `directive`, or `None` when nothing changes.
fn render_set_cookie(
    settings: &CookieSettings,
    directive: &CookieDirective,
    now: DateTime<Utc>,
) -> Option<String> {
    let (value, expires, max_age) = match directive {
        CookieDirective::Unchanged => return None,
        CookieDirective::Issue { token, expires_at } => (
            token.as_str().to_string(),
            http_date(*expires_at),
            (*expires_at - now).num_seconds().max(0),
        ),
        CookieDirective::Clear => (String::new(), http_date(DateTime::<Utc>::UNIX_EPOCH), 0),
    };

    let mut cookie = format!(
        "{}={}; Path=/; Expires={}; Max-Age={}; HttpOnly; SameSite=Lax",
        settings.name, value, expires, max_age
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    Some(cookie)
}
