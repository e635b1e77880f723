use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use docanalyzer::error::{StoreError, SubmitError};

/// Error type for HTTP handlers.
///
/// Every variant renders as `{"detail": <message>, "code": <CODE>}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Maps a multipart read failure, keeping the 413 axum reports for an
    /// over-limit body.
    pub fn from_multipart(err: MultipartError, limit: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(limit)
        } else {
            AppError::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match &self {
            AppError::Submit(err) => match err {
                SubmitError::UnsupportedMediaType { .. } => (
                    StatusCode::BAD_REQUEST,
                    "UNSUPPORTED_MEDIA_TYPE",
                    err.to_string(),
                ),
                SubmitError::EmptyFile(_) => {
                    (StatusCode::BAD_REQUEST, "EMPTY_FILE", err.to_string())
                }
                SubmitError::Stage(_) | SubmitError::Store(_) | SubmitError::Queue(_) => {
                    tracing::error!(error = %err, "Job submission failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "SUBMISSION_FAILED",
                        format!("Failed to submit job: {}", err),
                    )
                }
            },

            AppError::Store(StoreError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Job not found".to_string(),
            ),
            AppError::Store(err) => {
                tracing::error!(error = %err, "Job store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "detail": detail,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
