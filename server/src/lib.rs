//! HTTP boundary for docanalyzer.
//!
//! Exposes the router, state and error handling so the binary and the
//! integration tests build the same application.

pub mod error;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
