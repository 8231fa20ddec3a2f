//! Run, batch, step, and report types
//!
//! `BatchResult` is the transient unit of measurement: produced by one
//! pool runner, merged across regions by the dispatcher, folded into a
//! `StepResult` by the orchestrator, and never persisted on its own.
//! `RunReport` is the only durable artifact.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reasons;
use crate::stats::LatencySummary;

/// Tenant subscription tier; ceilings are fixed at token issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenantTier {
    #[default]
    Free,
    Pro,
    Scale,
}

impl TenantTier {
    /// Maximum target concurrency this tier may request
    pub fn max_concurrency(&self) -> u32 {
        match self {
            TenantTier::Free => 50,
            TenantTier::Pro => 5_000,
            TenantTier::Scale => 100_000,
        }
    }

    /// Maximum total request budget for a single run
    pub fn max_total_requests(&self) -> u64 {
        match self {
            TenantTier::Free => 2_000,
            TenantTier::Pro => 200_000,
            TenantTier::Scale => 5_000_000,
        }
    }
}

/// Why a run stopped ramping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Ran to completion; nothing cut it short
    #[default]
    None,
    /// User-initiated cancel; preempts smart-stop
    User,
    /// Error rate stayed at/above the threshold for enough consecutive steps
    SmartStop,
    /// Client went away mid-run; report saved so it is not silently lost
    Abandoned,
    /// Hard rejection (authorization/quota) or dispatch protocol violation
    Failed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::None => write!(f, "none"),
            StopReason::User => write!(f, "user"),
            StopReason::SmartStop => write!(f, "smart_stop"),
            StopReason::Abandoned => write!(f, "abandoned"),
            StopReason::Failed => write!(f, "failed"),
        }
    }
}

/// Run-start request (control plane input)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub url: String,
    pub total_request_budget: u64,
    pub target_concurrency: u32,
    #[serde(default)]
    pub tenant_tier: TenantTier,
    /// Explicit acknowledgement for runs above the confirmation threshold
    #[serde(default)]
    pub confirmed_high_load: bool,
}

/// Everything the orchestrator needs to execute a granted run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunGrant {
    pub token: String,
    pub run_id: String,
    /// Final URL after redirect pre-resolution; the token is bound to this
    pub resolved_target_url: String,
    pub count_per_batch: u32,
    pub max_batches: u32,
    pub dispatch_concurrency: u32,
    pub execution_endpoint: String,
    pub cancel_endpoint: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One batch dispatch call (wire request body)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub url: String,
    pub count: u32,
}

/// One rung of the ramp ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampStep {
    pub concurrency: u32,
    pub allocation: u32,
}

/// Outcome of one batch: counts, bounded latency samples, reason histogram
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchResult {
    pub sent: u64,
    pub ok: u64,
    pub errors: u64,
    pub latencies_ms: Vec<u64>,
    #[serde(default)]
    pub reasons: HashMap<String, u64>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub overloaded: bool,
    #[serde(default)]
    pub regions: Vec<String>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one successful request
    pub fn record_ok(&mut self, latency_ms: u64) {
        self.sent += 1;
        self.ok += 1;
        self.latencies_ms.push(latency_ms);
    }

    /// Count one failed request under a reason key
    pub fn record_error(&mut self, reason: &str, latency_ms: u64) {
        self.sent += 1;
        self.errors += 1;
        self.latencies_ms.push(latency_ms);
        *self.reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Book an entire failed regional split. No latency samples exist for
    /// requests that never launched, so only the counts move.
    pub fn region_failure(region: &str, allocation: u32) -> Self {
        let mut result = Self {
            sent: allocation as u64,
            errors: allocation as u64,
            regions: vec![region.to_string()],
            ..Self::default()
        };
        result
            .reasons
            .insert(reasons::REGION_EXECUTION_ERROR.to_string(), allocation as u64);
        result
    }

    /// Fold another result in: sum counts, concatenate samples, merge
    /// histograms by key, OR the flags, record executed regions.
    pub fn merge(&mut self, other: BatchResult) {
        self.sent += other.sent;
        self.ok += other.ok;
        self.errors += other.errors;
        self.latencies_ms.extend(other.latencies_ms);
        for (reason, count) in other.reasons {
            *self.reasons.entry(reason).or_insert(0) += count;
        }
        self.cancelled |= other.cancelled;
        self.overloaded |= other.overloaded;
        for region in other.regions {
            if !self.regions.contains(&region) {
                self.regions.push(region);
            }
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.errors as f64 / self.sent as f64
        }
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary::from_samples(&self.latencies_ms)
    }
}

/// Aggregate of all batches executed at one concurrency level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub concurrency: u32,
    pub allocation: u32,
    pub sent: u64,
    pub ok: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub summary: LatencySummary,
    pub reasons: HashMap<String, u64>,
    pub duration_ms: u64,
    pub overloaded: bool,
    pub regions: Vec<String>,
}

impl StepResult {
    /// Build the step aggregate from the merged batch results of one rung
    pub fn from_batches(step: RampStep, merged: BatchResult, duration_ms: u64) -> Self {
        Self {
            concurrency: step.concurrency,
            allocation: step.allocation,
            sent: merged.sent,
            ok: merged.ok,
            errors: merged.errors,
            error_rate: merged.error_rate(),
            summary: merged.summary(),
            reasons: merged.reasons,
            duration_ms,
            overloaded: merged.overloaded,
            regions: merged.regions,
        }
    }
}

/// Run-level totals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct RunTotals {
    pub sent: u64,
    pub ok: u64,
    pub errors: u64,
    pub duration_ms: u64,
}

/// Final, immutable run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub target_url: String,
    pub steps: Vec<StepResult>,
    pub totals: RunTotals,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
