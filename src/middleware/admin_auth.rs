//! Admin session check guarding the whole dashboard API.
//!
//! The session is a shared token presented either as the `admin_session`
//! cookie (how the dashboard sends it) or as a bearer token (how scripts
//! do). Comparison is constant-time.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::db::AppState;

const SESSION_COOKIE: &str = "admin_session";

/// Extract a Bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Extract the admin session cookie value.
fn extract_session_cookie(headers: &HeaderMap) -> Option<&str> {
    let cookies = headers.get("Cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub fn is_authenticated(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(ref expected) = state.admin_token else {
        // No token configured: open in dev mode, locked everywhere else.
        return state.dev_mode;
    };

    extract_session_cookie(headers)
        .or_else(|| extract_bearer_token(headers))
        .is_some_and(|presented| token_matches(presented, expected))
}

pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !is_authenticated(&state, request.headers()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
