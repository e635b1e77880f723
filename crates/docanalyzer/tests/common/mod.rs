//! Shared test utilities for docanalyzer integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runtimes backed by temp directories
//! - Builders for configs and small PDF documents
//! - Fake collaborators with scripted behaviour

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::{assert_result_matches_status, TestHarness};
