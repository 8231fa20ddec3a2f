//! Ramp orchestration
//!
//! Steps run strictly sequentially because smart-stop depends on what
//! the previous rungs saw. Within a step, enough dispatch calls run in
//! parallel to approximate the step's target concurrency; their results
//! are merged commutatively, so join order never matters.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::client::BatchDispatcher;
use crate::ladder::plan_steps;
use surge_config::LoadConfig;
use surge_core::{reasons, BatchResult, RunGrant, RunReport, RunRequest, RunTotals, StepResult, StopReason};
use surge_execution::{regions_for_count, CancelToken};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub rounds_per_step: u32,
    pub smart_stop_error_rate: f64,
    pub smart_stop_consecutive_steps: u32,
    pub pool_size: usize,
}

impl From<&LoadConfig> for OrchestratorConfig {
    fn from(config: &LoadConfig) -> Self {
        Self {
            rounds_per_step: config.rounds_per_step,
            smart_stop_error_rate: config.smart_stop_error_rate,
            smart_stop_consecutive_steps: config.smart_stop_consecutive_steps,
            pool_size: config.pool_size,
        }
    }
}

/// Parallel dispatch calls needed to approximate `concurrency`, given
/// what one batch call is worth, capped by the grant's ceiling.
pub fn step_parallelism(
    concurrency: u32,
    pool_size: usize,
    count_per_batch: u32,
    dispatch_ceiling: u32,
) -> u32 {
    let per_batch = (pool_size * regions_for_count(count_per_batch).len()).max(1) as u32;
    concurrency.div_ceil(per_batch).clamp(1, dispatch_ceiling.max(1))
}

/// A batch call lost in transit: the dispatch itself failed, so the
/// whole count is booked as errors with no samples.
fn lost_batch(count: u32) -> BatchResult {
    let mut result = BatchResult {
        sent: count as u64,
        errors: count as u64,
        ..BatchResult::new()
    };
    result
        .reasons
        .insert(reasons::REGION_EXECUTION_ERROR.to_string(), count as u64);
    result
}

/// Drives a granted run up the ramp ladder and assembles its report
pub struct RampOrchestrator {
    dispatcher: Arc<dyn BatchDispatcher>,
    config: OrchestratorConfig,
}

impl RampOrchestrator {
    pub fn new(dispatcher: Arc<dyn BatchDispatcher>, config: OrchestratorConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Execute the whole ramp. Always returns a report; every failure
    /// mode ends up as a stop reason, never a panic or error.
    pub async fn execute(
        &self,
        request: &RunRequest,
        grant: &RunGrant,
        cancel: &CancelToken,
    ) -> RunReport {
        let steps = plan_steps(
            request.target_concurrency,
            request.total_request_budget,
            self.config.rounds_per_step,
        );
        info!(
            run_id = %grant.run_id,
            steps = steps.len(),
            budget = request.total_request_budget,
            "starting ramp"
        );

        let started_at = Utc::now();
        let run_start = Instant::now();
        let mut results: Vec<StepResult> = Vec::with_capacity(steps.len());
        let mut consecutive_bad = 0u32;
        let mut stop = StopReason::None;

        for step in steps {
            if cancel.is_cancelled() {
                stop = StopReason::User;
                break;
            }

            let parallelism = step_parallelism(
                step.concurrency,
                self.config.pool_size,
                grant.count_per_batch,
                grant.dispatch_concurrency,
            );
            info!(
                concurrency = step.concurrency,
                allocation = step.allocation,
                parallelism,
                "ramp step"
            );

            let step_start = Instant::now();
            let mut merged = BatchResult::new();
            let mut remaining = step.allocation;

            while remaining > 0 {
                if cancel.is_cancelled() {
                    stop = StopReason::User;
                    break;
                }

                let mut wave = JoinSet::new();
                for _ in 0..parallelism {
                    if remaining == 0 {
                        break;
                    }
                    let count = remaining.min(grant.count_per_batch);
                    remaining -= count;

                    let dispatcher = self.dispatcher.clone();
                    let url = grant.resolved_target_url.clone();
                    wave.spawn(async move { (count, dispatcher.dispatch(&url, count).await) });
                }

                while let Some(joined) = wave.join_next().await {
                    let Ok((count, outcome)) = joined else {
                        warn!("dispatch task panicked");
                        continue;
                    };
                    match outcome {
                        Ok(batch) => merged.merge(batch),
                        Err(e) if e.is_fatal() => {
                            // A hard rejection means the grant no longer
                            // covers us; escalating further would only
                            // hammer the door.
                            error!(run_id = %grant.run_id, "dispatch rejected: {}", e);
                            stop = StopReason::Failed;
                        }
                        Err(e) => {
                            warn!(count, "batch call lost in transit: {}", e);
                            merged.merge(lost_batch(count));
                        }
                    }
                }

                if stop != StopReason::None {
                    break;
                }
                if merged.cancelled {
                    stop = StopReason::User;
                    break;
                }
            }

            let duration_ms = step_start.elapsed().as_millis() as u64;
            let result = StepResult::from_batches(step, merged, duration_ms);
            info!(
                concurrency = result.concurrency,
                sent = result.sent,
                errors = result.errors,
                p95_ms = result.summary.p95,
                "step finished"
            );

            if result.sent > 0 && result.error_rate >= self.config.smart_stop_error_rate {
                consecutive_bad += 1;
            } else {
                consecutive_bad = 0;
            }
            results.push(result);

            if stop != StopReason::None {
                break;
            }
            if consecutive_bad >= self.config.smart_stop_consecutive_steps {
                info!(
                    run_id = %grant.run_id,
                    consecutive_bad,
                    "error rate held above threshold, stopping early"
                );
                stop = StopReason::SmartStop;
                break;
            }
        }

        let totals = RunTotals {
            sent: results.iter().map(|s| s.sent).sum(),
            ok: results.iter().map(|s| s.ok).sum(),
            errors: results.iter().map(|s| s.errors).sum(),
            duration_ms: run_start.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %grant.run_id,
            sent = totals.sent,
            errors = totals.errors,
            stop_reason = %stop,
            "ramp finished"
        );

        RunReport {
            run_id: grant.run_id.clone(),
            target_url: grant.resolved_target_url.clone(),
            steps: results,
            totals,
            stop_reason: stop,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::DispatchError;
    use surge_core::TenantTier;

    #[derive(Clone, Copy)]
    enum CallPlan {
        /// Respond with roughly this fraction of errors
        Errors(f64),
        /// Respond with the run's cancellation flag set
        Cancelled,
        /// Reject the call as quota-exhausted
        Quota,
    }

    struct FakeDispatcher {
        script: Mutex<VecDeque<CallPlan>>,
        calls: AtomicU32,
    }

    impl FakeDispatcher {
        fn scripted(plans: &[CallPlan]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(plans.iter().copied().collect()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl BatchDispatcher for FakeDispatcher {
        async fn dispatch(&self, _url: &str, count: u32) -> Result<BatchResult, DispatchError> {
            assert!(count <= 50, "call count {} exceeds the grant", count);
            self.calls.fetch_add(1, Ordering::SeqCst);

            let plan = {
                let mut script = self.script.lock();
                script.pop_front().unwrap_or(CallPlan::Errors(0.0))
            };

            match plan {
                CallPlan::Errors(fraction) => {
                    let mut batch = BatchResult::new();
                    let errors = (count as f64 * fraction).ceil() as u32;
                    for _ in 0..errors {
                        batch.record_error(reasons::HTTP_5XX, 40);
                    }
                    for _ in errors..count {
                        batch.record_ok(20);
                    }
                    batch.regions.push("iad".to_string());
                    Ok(batch)
                }
                CallPlan::Cancelled => {
                    let mut batch = BatchResult::new();
                    batch.cancelled = true;
                    Ok(batch)
                }
                CallPlan::Quota => Err(DispatchError::QuotaExhausted),
            }
        }

        async fn cancel(&self, _run_id: &str) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            rounds_per_step: 1,
            smart_stop_error_rate: 0.9,
            smart_stop_consecutive_steps: 2,
            pool_size: 6,
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            url: "https://example.com/".to_string(),
            total_request_budget: 10_000,
            target_concurrency: 50,
            tenant_tier: TenantTier::Pro,
            confirmed_high_load: false,
        }
    }

    fn grant() -> RunGrant {
        RunGrant {
            token: "token".to_string(),
            run_id: "run-1".to_string(),
            resolved_target_url: "https://example.com/".to_string(),
            count_per_batch: 50,
            max_batches: 40,
            dispatch_concurrency: 2,
            execution_endpoint: "http://exec/api/v1/batch".to_string(),
            cancel_endpoint: "http://exec/api/v1/cancel".to_string(),
            warnings: Vec::new(),
        }
    }

    // With rounds_per_step = 1 and a 10k budget, target 50 plans the
    // ladder [10, 25, 50] with allocations [10, 25, 50]: one dispatch
    // call per step, so scripted call plans line up with steps.

    #[tokio::test]
    async fn test_healthy_run_walks_whole_ladder() {
        let dispatcher = FakeDispatcher::scripted(&[]);
        let orchestrator = RampOrchestrator::new(dispatcher.clone(), test_config());

        let report = orchestrator
            .execute(&request(), &grant(), &CancelToken::new())
            .await;

        assert_eq!(report.stop_reason, StopReason::None);
        let concurrencies: Vec<u32> = report.steps.iter().map(|s| s.concurrency).collect();
        assert_eq!(concurrencies, vec![10, 25, 50]);
        for step in &report.steps {
            assert_eq!(step.sent, step.allocation as u64);
        }
        assert_eq!(report.totals.sent, 85);
        assert_eq!(report.totals.errors, 0);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_two_consecutive_bad_steps_trigger_smart_stop() {
        let dispatcher =
            FakeDispatcher::scripted(&[CallPlan::Errors(0.95), CallPlan::Errors(0.95)]);
        let orchestrator = RampOrchestrator::new(dispatcher.clone(), test_config());

        let report = orchestrator
            .execute(&request(), &grant(), &CancelToken::new())
            .await;

        assert_eq!(report.stop_reason, StopReason::SmartStop);
        // The third milestone never executes.
        assert_eq!(report.steps.len(), 2);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_one_bad_step_between_good_ones_does_not_stop() {
        let dispatcher = FakeDispatcher::scripted(&[
            CallPlan::Errors(0.95),
            CallPlan::Errors(0.0),
            CallPlan::Errors(0.95),
        ]);
        let orchestrator = RampOrchestrator::new(dispatcher, test_config());

        let report = orchestrator
            .execute(&request(), &grant(), &CancelToken::new())
            .await;

        assert_eq!(report.stop_reason, StopReason::None);
        assert_eq!(report.steps.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_batch_stops_with_user_reason() {
        let dispatcher =
            FakeDispatcher::scripted(&[CallPlan::Errors(0.0), CallPlan::Cancelled]);
        let orchestrator = RampOrchestrator::new(dispatcher, test_config());

        let report = orchestrator
            .execute(&request(), &grant(), &CancelToken::new())
            .await;

        assert_eq!(report.stop_reason, StopReason::User);
        assert_eq!(report.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_quota_rejection_fails_the_run() {
        let dispatcher = FakeDispatcher::scripted(&[CallPlan::Errors(0.0), CallPlan::Quota]);
        let orchestrator = RampOrchestrator::new(dispatcher, test_config());

        let report = orchestrator
            .execute(&request(), &grant(), &CancelToken::new())
            .await;

        assert_eq!(report.stop_reason, StopReason::Failed);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_dispatches_nothing() {
        let dispatcher = FakeDispatcher::scripted(&[]);
        let orchestrator = RampOrchestrator::new(dispatcher.clone(), test_config());
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = orchestrator.execute(&request(), &grant(), &cancel).await;

        assert_eq!(report.stop_reason, StopReason::User);
        assert!(report.steps.is_empty());
        assert_eq!(report.totals.sent, 0);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_step_parallelism_bounds() {
        // One batch of 50 is worth 6 * 4 = 24 in-flight requests
        assert_eq!(step_parallelism(10, 6, 50, 8), 1);
        assert_eq!(step_parallelism(100, 6, 50, 8), 5);
        assert_eq!(step_parallelism(10_000, 6, 50, 8), 8); // grant ceiling
    }
}
