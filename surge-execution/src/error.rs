//! Error types for the execution tier

use thiserror::Error;

/// Execution errors that escape the dispatch boundary.
///
/// Target-side failures never appear here; they are counted outcomes
/// inside a `BatchResult`. These variants signal protocol violations and
/// infrastructure failures.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Batch quota exhausted for run {run_id}: {max_batches} batches already accepted")]
    QuotaExhausted { run_id: String, max_batches: u32 },

    #[error("Execution site failure: {0}")]
    SiteFailure(String),
}
