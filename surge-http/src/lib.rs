//! HTTP probe client for Surge
//!
//! One probe is one load-test request: randomized client headers, a
//! cache-busting query parameter, a hard per-request timeout, and an
//! outcome that is always a counted classification, never an error.

pub mod classify;
pub mod client;
pub mod errors;

pub use classify::classify_transport;
pub use client::{status_reachable, ProbeClient, ProbeOutcome, ResolvedTarget};
pub use errors::HttpError;
