//! API error types and their HTTP mappings.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP callers.
///
/// The webhook ingress path never uses these: its contract is to
/// acknowledge every delivery with 200 regardless of what breaks.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    ConfigurationMissing(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// Standard API error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ConfigurationMissing(_) | ApiError::Provider(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
