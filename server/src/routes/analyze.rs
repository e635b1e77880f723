use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub job_id: String,
    pub poll_url: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}

/// Strips any client-side directory from an uploaded filename.
fn base_filename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

/// POST /analyze
///
/// Stages the uploaded document and queues an analysis job. Responds with
/// 202 and the id to poll.
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    let limit = state.max_upload_bytes();
    let mut file: Option<(String, Bytes)> = None;
    let mut query: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_multipart(e, limit))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(base_filename)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        AppError::BadRequest("The 'file' field has no filename".to_string())
                    })?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::from_multipart(e, limit))?;
                if bytes.len() > limit {
                    return Err(AppError::PayloadTooLarge(limit));
                }
                file = Some((filename, bytes));
            }
            Some("query") => {
                query = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::from_multipart(e, limit))?,
                );
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    let service = state.service().clone();
    let job = tokio::task::spawn_blocking(move || {
        service.submit(&bytes, &filename, query.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Submission task failed: {}", e)))??;

    tracing::info!(job_id = %job.id, filename = %job.filename, "Analysis job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            status: "success",
            message: "Analysis job submitted successfully.",
            poll_url: format!("/status/{}", job.id),
            job_id: job.id,
        }),
    ))
}
