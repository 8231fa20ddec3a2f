//! Authorization error types

use thiserror::Error;

/// Authorization result type
pub type AuthResult<T> = Result<T, AuthError>;

/// Authorization errors. All of these are fatal to the call that raised
/// them and are never retried.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token does not authorize target '{requested}'")]
    TargetMismatch { requested: String },

    #[error("Batch count {requested} exceeds granted count per batch {granted}")]
    CountExceedsGrant { requested: u32, granted: u32 },

    #[error("Failed to sign token: {0}")]
    SigningFailed(String),
}
