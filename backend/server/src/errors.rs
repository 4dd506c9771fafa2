//! Application-wide error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Gateway error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("KHQR generation error: {0}")]
    Qr(#[from] khqr::KhqrError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Profile not found")]
    ProfileNotFound,
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Client faults carry a `{"message"}` body, server faults an `{"error"}`
/// body, matching what the frontend expects.
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "message": msg }),
            ),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "message": self.to_string() }),
            ),
            Self::ProfileNotFound => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "message": self.to_string() }),
            ),
            Self::Qr(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": self.to_string() }),
            ),
            _ => {
                error!("internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
