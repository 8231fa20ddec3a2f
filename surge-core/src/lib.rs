//! Core domain types for the Surge load-generation engine
//!
//! This crate holds the types shared across the execution tier and the
//! orchestrator: batch and step results, the final run report, latency
//! statistics, and the canonical outcome-reason taxonomy.

pub mod reasons;
pub mod stats;
pub mod types;

// Re-export main types
pub use stats::{percentile, LatencySummary};
pub use types::{
    BatchRequest, BatchResult, RampStep, RunGrant, RunReport, RunRequest, RunTotals, StepResult,
    StopReason,
    TenantTier,
};
