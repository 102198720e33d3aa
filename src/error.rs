use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy for the feed service. Every request error surfaces
/// directly to the caller; nothing is retried.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("unauthorized")]
    Auth,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("storage_error")]
    Storage(#[from] rusqlite::Error),
    #[error("storage_error")]
    Pool(#[from] r2d2::Error),
}

#[derive(Serialize)]
struct ErrorResp {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // underlying storage detail is logged, never sent to the client
        match &self {
            AppError::Storage(e) => tracing::error!(error = %e, "storage failure"),
            AppError::Pool(e) => tracing::error!(error = %e, "connection pool failure"),
            _ => {}
        }
        (
            status,
            Json(ErrorResp {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
