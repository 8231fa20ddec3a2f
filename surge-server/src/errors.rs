//! REST API error types and conversions
//!
//! Every error leaves the API as the same JSON envelope:
//! `{ "error": { "code", "message", "status" } }`, where `code` is a
//! stable machine-readable reason.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use surge_auth::AuthError;
use surge_execution::ExecutionError;
use surge_ramp::PlanError;

/// REST API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::QuotaExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Plan(e) => match e {
                PlanError::InvalidRequest(_)
                | PlanError::InvalidTarget(_)
                | PlanError::TargetNotAllowed(_) => StatusCode::BAD_REQUEST,
                PlanError::TargetUnreachable(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PlanError::ConcurrencyExceedsTier { .. } | PlanError::BudgetExceedsTier { .. } => {
                    StatusCode::FORBIDDEN
                }
                PlanError::ConfirmationRequired { .. } => StatusCode::CONFLICT,
                PlanError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::QuotaExhausted(_) => "quota_exhausted",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::InternalError(_) => "internal_error",
            ApiError::Plan(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_response = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "status": status.as_u16()
            }
        });
        (status, Json(error_response)).into_response()
    }
}

// Token violations fail closed as 401; there is no partial trust.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::QuotaExhausted { .. } => ApiError::QuotaExhausted(err.to_string()),
            ExecutionError::SiteFailure(msg) => ApiError::InternalError(msg),
        }
    }
}
