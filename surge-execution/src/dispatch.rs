//! Regional dispatcher
//!
//! Splits one logical batch across execution sites for network-path
//! diversity, runs the splits in parallel, and merges the results. A
//! site that fails entirely (dispatch failure, not a target error) books
//! its whole allocation as errors so the loss never disappears from the
//! accounting.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::ExecutionError;
use crate::pool::BatchPoolRunner;
use crate::regions::{regions_for_count, Region};
use surge_core::BatchResult;

/// Seam between the dispatcher and an execution site.
#[async_trait]
pub trait SiteRunner: Send + Sync {
    async fn run_site(
        &self,
        region: &'static Region,
        url: &str,
        count: u32,
        cancel: CancelToken,
    ) -> Result<BatchResult, ExecutionError>;
}

/// Runs every split from the local process.
///
/// Egress diversity degrades to a single network path, but splitting,
/// merging, and accounting stay identical, which keeps single-site
/// deployments and tests honest.
pub struct LocalSiteRunner {
    runner: BatchPoolRunner,
}

impl LocalSiteRunner {
    pub fn new(runner: BatchPoolRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SiteRunner for LocalSiteRunner {
    async fn run_site(
        &self,
        region: &'static Region,
        url: &str,
        count: u32,
        cancel: CancelToken,
    ) -> Result<BatchResult, ExecutionError> {
        let mut result = self.runner.run(url, count, &cancel).await;
        result.regions.push(region.code.to_string());
        Ok(result)
    }
}

/// Divide `count` across `sites` as evenly as possible (largest
/// remainder): every request lands somewhere, none are lost to rounding.
pub fn split_allocations(count: u32, sites: usize) -> Vec<u32> {
    if sites == 0 {
        return Vec::new();
    }
    let n = sites as u32;
    let base = count / n;
    let remainder = (count % n) as usize;
    (0..sites)
        .map(|i| base + u32::from(i < remainder))
        .collect()
}

/// Fans one batch out across regions and merges the results
pub struct RegionalDispatcher {
    sites: Arc<dyn SiteRunner>,
}

impl RegionalDispatcher {
    pub fn new(sites: Arc<dyn SiteRunner>) -> Self {
        Self { sites }
    }

    /// Execute one batch of `count` requests, fanned out by volume tier.
    pub async fn dispatch(&self, url: &str, count: u32, cancel: &CancelToken) -> BatchResult {
        let regions = regions_for_count(count);
        let allocations = split_allocations(count, regions.len());
        debug!(count, sites = regions.len(), "dispatching batch");

        let mut splits = JoinSet::new();
        for (region, allocation) in regions.into_iter().zip(allocations) {
            if allocation == 0 {
                continue;
            }
            let sites = self.sites.clone();
            let url = url.to_string();
            let cancel = cancel.clone();
            splits.spawn(async move {
                let outcome = sites.run_site(region, &url, allocation, cancel).await;
                (region, allocation, outcome)
            });
        }

        let mut merged = BatchResult::new();
        while let Some(joined) = splits.join_next().await {
            let Ok((region, allocation, outcome)) = joined else {
                // A panicked split task cannot report its own loss.
                warn!("split task panicked");
                continue;
            };
            match outcome {
                Ok(mut result) => {
                    if result.regions.is_empty() {
                        result.regions.push(region.code.to_string());
                    }
                    merged.merge(result);
                }
                Err(e) => {
                    warn!(region = region.code, allocation, "split failed: {}", e);
                    merged.merge(BatchResult::region_failure(region.code, allocation));
                }
            }
        }
        merged
    }
}
