//! Error types for the HTTP API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use querydeck_core::CacheError;

/// Errors that can occur in the HTTP API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested consumer, query, or data source was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A refresh against the data source failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A snapshot did not have the shape the requested view needs.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The request body was structurally valid JSON but unusable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        let message = err.to_string();
        match err {
            CacheError::NotFound { .. } => Self::NotFound(message),
            CacheError::Fetch { .. } => Self::Fetch(message),
            CacheError::TypeMismatch { .. } => Self::TypeMismatch(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Fetch(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::TypeMismatch(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
