use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use docanalyzer::JobStatusView;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/status/{job_id}", get(job_status))
}

/// GET /status/{job_id}
///
/// `result` is only present once the job is completed or failed.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobStatusView>> {
    let service = state.service().clone();
    let view = tokio::task::spawn_blocking(move || service.status(&job_id))
        .await
        .map_err(|e| AppError::Internal(format!("Status task failed: {}", e)))??;
    Ok(Json(view))
}
