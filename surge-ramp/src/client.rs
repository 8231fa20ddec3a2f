//! Batch dispatch client
//!
//! The orchestrator never talks to pools directly; it streams batch
//! calls through this seam. The HTTP implementation posts to the
//! execution endpoint with the capability token as bearer credential and
//! maps hard rejections (401/429) onto typed errors so the orchestrator
//! can distinguish protocol violations from target-side noise.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::DispatchError;
use surge_core::{BatchRequest, BatchResult};

/// Seam between the orchestrator and the execution tier
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    /// Execute one batch of `count` requests against `url`.
    async fn dispatch(&self, url: &str, count: u32) -> Result<BatchResult, DispatchError>;

    /// Set the cancellation flag for a run. Idempotent.
    async fn cancel(&self, run_id: &str) -> Result<(), DispatchError>;
}

/// Dispatches batches over HTTP with a bearer capability token
pub struct HttpBatchDispatcher {
    client: reqwest::Client,
    execution_endpoint: String,
    cancel_endpoint: String,
    token: String,
}

impl HttpBatchDispatcher {
    pub fn new(execution_endpoint: String, cancel_endpoint: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            execution_endpoint,
            cancel_endpoint,
            token,
        }
    }
}

#[async_trait]
impl BatchDispatcher for HttpBatchDispatcher {
    async fn dispatch(&self, url: &str, count: u32) -> Result<BatchResult, DispatchError> {
        debug!(count, "dispatching batch call");
        let response = self
            .client
            .post(&self.execution_endpoint)
            .bearer_auth(&self.token)
            .json(&BatchRequest {
                url: url.to_string(),
                count,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                response.json::<BatchResult>().await.map_err(DispatchError::from)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(DispatchError::Unauthorized(body))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(DispatchError::QuotaExhausted),
            status => Err(DispatchError::Protocol(format!(
                "unexpected dispatch status {}",
                status
            ))),
        }
    }

    async fn cancel(&self, run_id: &str) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.cancel_endpoint)
            .json(&serde_json::json!({ "run_id": run_id }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DispatchError::Protocol(format!(
                "cancel returned {}",
                response.status()
            )))
        }
    }
}
