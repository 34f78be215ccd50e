mod keys;
mod subscribers;

pub use keys::*;
pub use subscribers::*;

use axum::{
    Json, Router,
    http::HeaderMap,
    routing::{get, post, put},
};
use serde::Serialize;

use crate::db::AppState;
use crate::middleware::{admin_auth, is_authenticated};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct AuthCheckResponse {
    authenticated: bool,
}

async fn auth_check(
    axum::extract::State(state): axum::extract::State<AppState>,
    headers: HeaderMap,
) -> Json<AuthCheckResponse> {
    Json(AuthCheckResponse {
        authenticated: is_authenticated(&state, &headers),
    })
}

/// Admin API routes; everything except /health and /auth/check sits behind
/// the admin session middleware.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/keys", get(list_keys).post(create_key))
        .route("/keys/{key}", get(get_key))
        .route("/keys/{key}/history", get(key_history))
        .route("/keys/{key}/extend", post(extend_key))
        .route("/keys/{key}/disable", post(disable_key))
        .route("/keys/{key}/reactivate", post(reactivate_key))
        .route("/keys/{key}/deal-closed", post(deal_closed))
        .route("/keys/{key}/edit", put(edit_key))
        .route("/keys/{key}/send-email", post(send_key_email))
        .route("/users/{email}/keys", get(list_keys_for_user))
        .route("/subscribers", get(list_subscribers))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/auth/check", get(auth_check))
        .merge(protected)
        .with_state(state)
}
