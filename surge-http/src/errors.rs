//! HTTP error types

/// Error type for probe client construction and target resolution.
///
/// Probe outcomes themselves never surface as errors; these variants only
/// cover the paths where a caller genuinely cannot proceed.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Target unreachable: {0}")]
    Unreachable(String),
}
