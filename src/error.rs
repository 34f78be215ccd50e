use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input; surfaced verbatim as 400
    #[error("{0}")]
    BadRequest(String),

    /// Referenced key (or other resource) does not exist; surfaced as 404
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid admin session
    #[error("{0}")]
    Unauthorized(String),

    /// Deal-closed conversion applied phase one (trial -> development) but
    /// failed before the production key existed. The caller must know the
    /// trial key was already mutated, so this is not a generic 500.
    #[error("conversion partially completed: key {0} was converted to development but no production key was created")]
    ConversionIncomplete(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Email relay failure. Lifecycle operations catch and log this; it only
    /// escapes from the explicit send-email endpoint.
    #[error("email relay error: {0}")]
    Email(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::ConversionIncomplete(_) => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            // Storage internals stay out of responses
            AppError::Database(_) | AppError::Pool(_) | AppError::Json(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Email(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to send email".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
