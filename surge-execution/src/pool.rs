//! Constant-size batch pool runner
//!
//! Executes exactly `count` requests while holding a fixed number of
//! requests in flight: never more, and never fewer until the tail
//! drains. The pool is expressed as N workers pulling indices from a
//! shared atomic counter; each completion immediately frees a worker to
//! claim the next index, so load stays steady instead of pulsed.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use surge_config::LoadConfig;
use surge_core::{percentile, BatchResult};
use surge_http::ProbeClient;

/// Pool runner configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// In-flight requests held while work remains
    pub pool_size: usize,
    /// Upper bound of the random pre-launch delay; zero disables jitter
    pub launch_jitter: Duration,
    /// Outcomes required before the overload gate is evaluated
    pub overload_min_samples: usize,
    /// p95 latency beyond which no new requests are launched
    pub overload_p95: Duration,
}

impl From<&LoadConfig> for PoolConfig {
    fn from(config: &LoadConfig) -> Self {
        Self {
            pool_size: config.pool_size,
            launch_jitter: config.launch_jitter,
            overload_min_samples: config.overload_min_samples,
            overload_p95: config.overload_p95,
        }
    }
}

/// Executes one batch at one site with a constant-size concurrency pool
#[derive(Debug, Clone)]
pub struct BatchPoolRunner {
    client: ProbeClient,
    config: PoolConfig,
}

impl BatchPoolRunner {
    pub fn new(client: ProbeClient, config: PoolConfig) -> Self {
        Self { client, config }
    }

    /// Drain `count` requests against `url`.
    ///
    /// Cancellation is checked before every launch; in-flight requests
    /// finish and are counted. Once the overload gate trips, workers stop
    /// claiming new work and whatever completed is returned.
    pub async fn run(&self, url: &str, count: u32, cancel: &CancelToken) -> BatchResult {
        if count == 0 || cancel.is_cancelled() {
            let mut result = BatchResult::new();
            result.cancelled = cancel.is_cancelled();
            return result;
        }

        let next_index = Arc::new(AtomicU32::new(0));
        let overloaded = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(BatchResult::new()));

        let workers = self.config.pool_size.min(count as usize);
        debug!(count, workers, url, "starting batch pool");

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let client = self.client.clone();
            let config = self.config.clone();
            let next_index = next_index.clone();
            let overloaded = overloaded.clone();
            let state = state.clone();
            let cancel = cancel.clone();
            let url = url.to_string();

            pool.spawn(async move {
                loop {
                    if cancel.is_cancelled() || overloaded.load(Ordering::Acquire) {
                        break;
                    }

                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= count {
                        break;
                    }

                    if !config.launch_jitter.is_zero() {
                        let jitter_ms = fastrand::u64(0..=config.launch_jitter.as_millis() as u64);
                        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                    }

                    let outcome = client.probe(&url).await;

                    let mut result = state.lock();
                    match outcome.reason {
                        None => result.record_ok(outcome.latency_ms),
                        Some(reason) => result.record_error(reason, outcome.latency_ms),
                    }

                    // Overload gate: sustained high tail latency means more
                    // load adds no information, only risk of an
                    // everything-times-out result.
                    if result.sent as usize >= config.overload_min_samples && !result.overloaded {
                        let mut sorted = result.latencies_ms.clone();
                        sorted.sort_unstable();
                        let p95 = percentile(&sorted, 0.95);
                        if p95 > config.overload_p95.as_millis() as f64 {
                            warn!(p95_ms = p95, "overload gate tripped, stopping new launches");
                            result.overloaded = true;
                            overloaded.store(true, Ordering::Release);
                        }
                    }
                }
            });
        }

        while pool.join_next().await.is_some() {}

        let mut result = Arc::try_unwrap(state)
            .map(Mutex::into_inner)
            .unwrap_or_else(|state| state.lock().clone());
        if cancel.is_cancelled() {
            result.cancelled = true;
        }
        result
    }
}
