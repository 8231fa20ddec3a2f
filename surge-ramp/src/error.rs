//! Planning and dispatch error types

use thiserror::Error;

/// Run-start rejections. Each variant carries a stable machine-readable
/// code that clients use to prompt for confirmation or an upgrade.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("Target not allowed: {0}")]
    TargetNotAllowed(String),

    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("Requested concurrency {requested} exceeds tier ceiling {ceiling}")]
    ConcurrencyExceedsTier { requested: u32, ceiling: u32 },

    #[error("Requested budget {requested} exceeds tier ceiling {ceiling}")]
    BudgetExceedsTier { requested: u64, ceiling: u64 },

    #[error("Runs at concurrency {concurrency} require explicit confirmation")]
    ConfirmationRequired { concurrency: u32 },

    #[error("Failed to sign capability token: {0}")]
    Signing(String),
}

impl PlanError {
    /// Stable reason code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::InvalidRequest(_) => "invalid_request",
            PlanError::InvalidTarget(_) => "invalid_target",
            PlanError::TargetNotAllowed(_) => "target_not_allowed",
            PlanError::TargetUnreachable(_) => "target_unreachable",
            PlanError::ConcurrencyExceedsTier { .. } => "concurrency_exceeds_tier",
            PlanError::BudgetExceedsTier { .. } => "budget_exceeds_tier",
            PlanError::ConfirmationRequired { .. } => "confirmation_required",
            PlanError::Signing(_) => "internal_error",
        }
    }
}

/// Failures of one batch dispatch call.
///
/// Authorization and quota rejections signal protocol violations and are
/// fatal to the run; transport failures are absorbed into the accounting
/// as lost allocations.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Dispatch rejected: {0}")]
    Unauthorized(String),

    #[error("Batch quota exhausted")]
    QuotaExhausted,

    #[error("Dispatch transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Dispatch protocol error: {0}")]
    Protocol(String),
}

impl DispatchError {
    /// Whether this failure must stop the run rather than be counted
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::Unauthorized(_) | DispatchError::QuotaExhausted | DispatchError::Protocol(_)
        )
    }
}
