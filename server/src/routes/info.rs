use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use docanalyzer::JobCounts;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub message: &'static str,
    pub queue: &'static str,
    pub accepted_extensions: Vec<String>,
    pub endpoints: BTreeMap<&'static str, &'static str>,
    pub jobs: JobCounts,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(info))
}

/// GET /
pub async fn info(State(state): State<AppState>) -> AppResult<Json<ServiceInfo>> {
    let service = state.service().clone();
    let jobs = tokio::task::spawn_blocking(move || service.job_counts())
        .await
        .map_err(|e| AppError::Internal(format!("Info task failed: {}", e)))??;

    let endpoints = BTreeMap::from([
        (
            "POST /analyze",
            "Upload a document to start a background analysis job.",
        ),
        (
            "GET /status/{job_id}",
            "Check the status and get results of a job.",
        ),
    ]);

    Ok(Json(ServiceInfo {
        service: "docanalyzer",
        version: env!("CARGO_PKG_VERSION"),
        message: "Document analysis API is running.",
        queue: state.service().queue_name(),
        accepted_extensions: state.service().accepted_extensions().to_vec(),
        endpoints,
        jobs,
    }))
}
