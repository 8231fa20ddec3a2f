//! Application context containing all shared services

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use surge_auth::TokenService;
use surge_config::SurgeConfig;
use surge_core::RunReport;
use surge_execution::{
    BatchPoolRunner, CancellationRegistry, LocalSiteRunner, PoolConfig, QuotaTracker,
    RegionalDispatcher,
};
use surge_http::{HttpError, ProbeClient};
use surge_ramp::{PlannerConfig, RunPlanner};

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppContext {
    pub tokens: Arc<TokenService>,
    pub planner: Arc<RunPlanner>,
    pub quota: Arc<QuotaTracker>,
    pub cancellations: Arc<CancellationRegistry>,
    pub dispatcher: Arc<RegionalDispatcher>,
    /// Saved run reports keyed by run id. Same best-effort posture as
    /// the quota tracker; durable storage lives with the collaborating
    /// control plane.
    pub reports: Arc<Mutex<HashMap<String, RunReport>>>,
}

impl AppContext {
    /// Wire the full service graph from configuration.
    pub fn from_config(config: &SurgeConfig) -> Result<Self, HttpError> {
        let server = config.server.clone().unwrap_or_default();
        let probe = ProbeClient::new(config.http.clone())?;

        let runner = BatchPoolRunner::new(probe.clone(), PoolConfig::from(&config.load));
        let dispatcher = RegionalDispatcher::new(Arc::new(LocalSiteRunner::new(runner)));

        let tokens = TokenService::new(&config.auth);
        let planner = RunPlanner::new(
            TokenService::new(&config.auth),
            probe,
            PlannerConfig {
                public_url: server.public_url.clone(),
                allow_loopback_targets: server.allow_loopback_targets,
                load: config.load.clone(),
            },
        );

        Ok(Self {
            tokens: Arc::new(tokens),
            planner: Arc::new(planner),
            quota: Arc::new(QuotaTracker::new()),
            cancellations: Arc::new(CancellationRegistry::new()),
            dispatcher: Arc::new(dispatcher),
            reports: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}
