//! Route table and middleware stack.
//!
//! ```text
//! GET  /                  info      service info and job counts
//! POST /analyze           analyze   multipart upload (file, query)
//! GET  /status/{job_id}   status    job status and result
//! ```

pub mod analyze;
pub mod info;
pub mod status;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::state::AppState;

/// Room for multipart boundaries, headers and the query field on top of
/// the file itself.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the application router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .merge(info::router())
        .merge(analyze::router())
        .merge(status::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
