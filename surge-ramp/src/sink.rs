//! Report persistence
//!
//! Saving a report is fire-and-forget: the run is already over, and a
//! persistence hiccup must never surface to the caller. Failures are
//! logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use surge_core::RunReport;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Report transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Report rejected with status {0}")]
    Rejected(u16),
}

/// Destination for finished run reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn save(&self, report: &RunReport) -> Result<(), SinkError>;
}

/// Posts reports to the control plane
pub struct HttpReportSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReportSink {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ReportSink for HttpReportSink {
    async fn save(&self, report: &RunReport) -> Result<(), SinkError> {
        let response = self
            .client
            .post(format!("{}/api/v1/runs/{}/report", self.base_url, report.run_id))
            .json(report)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected(response.status().as_u16()))
        }
    }
}

/// Save a report on a detached task. The task owns the report; its
/// failure is logged, never propagated. The handle is returned so a
/// caller about to exit can wait for the attempt without seeing it fail.
pub fn save_detached(sink: Arc<dyn ReportSink>, report: RunReport) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match sink.save(&report).await {
            Ok(()) => debug!(run_id = %report.run_id, "report saved"),
            Err(e) => warn!(run_id = %report.run_id, "failed to save report: {}", e),
        }
    })
}
