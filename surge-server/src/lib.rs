//! Surge REST API
//!
//! One axum application carries both halves of the platform: the
//! control-plane surface (run start, report save) and the execution-tier
//! surface (batch dispatch, cancel). Batch dispatch is the hot path; it
//! verifies the bearer capability token, charges the quota, and hands the
//! call to the regional dispatcher.

pub mod app;
pub mod context;
pub mod errors;
pub mod handlers;

pub use app::{create_app, serve, serve_with_listener};
pub use context::AppContext;
pub use errors::{ApiError, ApiResult};
