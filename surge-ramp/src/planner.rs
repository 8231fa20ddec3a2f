//! Run planning: the control-plane half of token issuance
//!
//! A run request is validated (target class, tenant-tier ceilings,
//! confirmation flags), the target URL is pre-resolved so the token is
//! bound to the final address, and the capability token is signed. The
//! grant returned here is everything an untrusted orchestrator needs,
//! and everything it gets.

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::PlanError;
use crate::ladder::build_ladder;
use surge_auth::TokenService;
use surge_config::validation::{validate_target_url, validate_url};
use surge_config::LoadConfig;
use surge_core::{RunGrant, RunRequest};
use surge_execution::regions_for_count;
use surge_http::{status_reachable, ProbeClient};

/// Concurrency at or above which a run needs an explicit confirmation flag
const CONFIRMATION_THRESHOLD: u32 = 1_000;

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Externally reachable base URL of the execution tier
    pub public_url: String,
    /// Allow loopback targets (integration/test deployments only)
    pub allow_loopback_targets: bool,
    pub load: LoadConfig,
}

/// Validates run requests and issues capability grants
pub struct RunPlanner {
    tokens: TokenService,
    probe: ProbeClient,
    config: PlannerConfig,
}

impl RunPlanner {
    pub fn new(tokens: TokenService, probe: ProbeClient, config: PlannerConfig) -> Self {
        Self { tokens, probe, config }
    }

    /// Validate a run request and issue its grant.
    pub async fn plan(&self, request: &RunRequest) -> Result<RunGrant, PlanError> {
        if request.total_request_budget == 0 {
            return Err(PlanError::InvalidRequest(
                "total_request_budget must be greater than 0".to_string(),
            ));
        }
        if request.target_concurrency == 0 {
            return Err(PlanError::InvalidRequest(
                "target_concurrency must be greater than 0".to_string(),
            ));
        }

        validate_url(&request.url, "url", "run")
            .map_err(|e| PlanError::InvalidTarget(e.to_string()))?;
        validate_target_url(&request.url, "url", "run", self.config.allow_loopback_targets)
            .map_err(|e| PlanError::TargetNotAllowed(e.to_string()))?;

        let tier = request.tenant_tier;
        if request.target_concurrency > tier.max_concurrency() {
            return Err(PlanError::ConcurrencyExceedsTier {
                requested: request.target_concurrency,
                ceiling: tier.max_concurrency(),
            });
        }
        if request.total_request_budget > tier.max_total_requests() {
            return Err(PlanError::BudgetExceedsTier {
                requested: request.total_request_budget,
                ceiling: tier.max_total_requests(),
            });
        }
        if request.target_concurrency >= CONFIRMATION_THRESHOLD && !request.confirmed_high_load {
            return Err(PlanError::ConfirmationRequired {
                concurrency: request.target_concurrency,
            });
        }

        // Pre-resolve redirects so the token binds to the final URL; a
        // target that moves mid-run cannot drag the pool with it.
        let resolved = self
            .probe
            .resolve_target(&request.url)
            .await
            .map_err(|e| PlanError::TargetUnreachable(e.to_string()))?;

        let mut warnings = Vec::new();
        if resolved.redirected {
            warnings.push(format!(
                "target redirects; run is bound to {}",
                resolved.final_url
            ));
        }
        if !status_reachable(resolved.status) {
            warnings.push(format!(
                "target answered {} at issuance; the run may measure an already-failing endpoint",
                resolved.status
            ));
        }

        let count_per_batch = (self.config.load.count_per_batch as u64)
            .min(request.total_request_budget) as u32;
        // Each ramp step can leave one partial batch, so the ceiling gets
        // one call of slack per rung on top of the exact budget.
        let slack = build_ladder(request.target_concurrency).len() as u32;
        let max_batches =
            request.total_request_budget.div_ceil(count_per_batch as u64) as u32 + slack;
        let dispatch_concurrency = dispatch_concurrency_for(
            request.target_concurrency,
            self.config.load.pool_size,
            count_per_batch,
        );

        let run_id = Uuid::new_v4().to_string();
        let token = self
            .tokens
            .issue(
                &run_id,
                &resolved.final_url,
                count_per_batch,
                max_batches,
                request.target_concurrency,
            )
            .map_err(|e| PlanError::Signing(e.to_string()))?;

        info!(
            run_id = %run_id,
            target = %resolved.final_url,
            budget = request.total_request_budget,
            concurrency = request.target_concurrency,
            count_per_batch,
            max_batches,
            "run granted"
        );
        debug!(run_id = %run_id, dispatch_concurrency, "grant parameters");

        Ok(RunGrant {
            token,
            run_id,
            resolved_target_url: resolved.final_url,
            count_per_batch,
            max_batches,
            dispatch_concurrency,
            execution_endpoint: format!("{}/api/v1/batch", self.config.public_url),
            cancel_endpoint: format!("{}/api/v1/cancel", self.config.public_url),
            warnings,
        })
    }
}

/// Parallel dispatch calls needed to hold the target concurrency, given
/// what one batch call is worth (pool size × regions it fans out to).
pub fn dispatch_concurrency_for(target_concurrency: u32, pool_size: usize, count_per_batch: u32) -> u32 {
    let per_batch = (pool_size * regions_for_count(count_per_batch).len()).max(1) as u32;
    target_concurrency.div_ceil(per_batch).clamp(1, 64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::routing::get;
    use axum::Router;

    use surge_config::{AuthConfig, HttpConfig};
    use surge_core::TenantTier;

    async fn spawn_target() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn planner(allow_loopback: bool) -> RunPlanner {
        let tokens = TokenService::new(&AuthConfig {
            token_secret: "0123456789abcdef0123456789abcdef".to_string(),
            token_ttl: Duration::from_secs(600),
            issuer: "surge-control".to_string(),
        });
        let probe = ProbeClient::new(HttpConfig {
            timeout: Duration::from_secs(2),
            ..HttpConfig::default()
        })
        .unwrap();
        RunPlanner::new(
            tokens,
            probe,
            PlannerConfig {
                public_url: "http://exec.internal:8090".to_string(),
                allow_loopback_targets: allow_loopback,
                load: LoadConfig::default(),
            },
        )
    }

    fn request(url: &str) -> RunRequest {
        RunRequest {
            url: url.to_string(),
            total_request_budget: 1_000,
            target_concurrency: 40,
            tenant_tier: TenantTier::Pro,
            confirmed_high_load: false,
        }
    }

    #[tokio::test]
    async fn test_plan_grants_reachable_target() {
        let url = spawn_target().await;
        let grant = planner(true).plan(&request(&url)).await.unwrap();

        assert_eq!(grant.resolved_target_url, url);
        assert_eq!(grant.count_per_batch, 50);
        // 1000 / 50 = 20 batches plus one slack call per ladder rung
        // (target 40 -> ladder [10, 25, 40])
        assert_eq!(grant.max_batches, 23);
        assert!(grant.execution_endpoint.ends_with("/api/v1/batch"));
        assert!(grant.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_small_budget_shrinks_batch_size() {
        let url = spawn_target().await;
        let mut req = request(&url);
        req.total_request_budget = 30;

        let grant = planner(true).plan(&req).await.unwrap();
        assert_eq!(grant.count_per_batch, 30);
    }

    #[tokio::test]
    async fn test_loopback_rejected_unless_allowed() {
        let url = spawn_target().await;
        let err = planner(false).plan(&request(&url)).await.unwrap_err();
        assert_eq!(err.code(), "target_not_allowed");
    }

    #[tokio::test]
    async fn test_tier_ceilings_enforced() {
        let url = spawn_target().await;

        let mut req = request(&url);
        req.tenant_tier = TenantTier::Free;
        req.target_concurrency = 100;
        let err = planner(true).plan(&req).await.unwrap_err();
        assert_eq!(err.code(), "concurrency_exceeds_tier");

        let mut req = request(&url);
        req.tenant_tier = TenantTier::Free;
        req.total_request_budget = 50_000;
        let err = planner(true).plan(&req).await.unwrap_err();
        assert_eq!(err.code(), "budget_exceeds_tier");
    }

    #[tokio::test]
    async fn test_high_load_requires_confirmation() {
        let url = spawn_target().await;
        let mut req = request(&url);
        req.target_concurrency = 2_000;
        req.total_request_budget = 50_000;

        let err = planner(true).plan(&req).await.unwrap_err();
        assert_eq!(err.code(), "confirmation_required");

        req.confirmed_high_load = true;
        assert!(planner(true).plan(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_target_rejected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = planner(true)
            .plan(&request(&format!("http://{}/", addr)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "target_unreachable");
    }

    #[test]
    fn test_dispatch_concurrency_scales_with_target() {
        // 50-per-batch fans out to 4 sites of pool 6 -> 24 effective
        assert_eq!(dispatch_concurrency_for(10, 6, 50), 1);
        assert_eq!(dispatch_concurrency_for(100, 6, 50), 5);
        assert_eq!(dispatch_concurrency_for(10_000, 6, 50), 64); // clamped
    }
}
