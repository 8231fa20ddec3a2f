//! Load-engine configuration: pool behavior, overload gate, ramp policy

use crate::error::ConfigResult;
use crate::validation::{validate_fraction, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batch pool and ramp configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// In-flight requests held by one pool runner
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Upper bound of the random pre-launch delay that de-synchronizes
    /// worker start bursts. Zero disables jitter.
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_launch_jitter"
    )]
    pub launch_jitter: Duration,

    /// Outcomes that must land before the overload gate is evaluated
    #[serde(default = "default_overload_min_samples")]
    pub overload_min_samples: usize,

    /// p95 latency at which a runner stops launching new requests
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_overload_p95"
    )]
    pub overload_p95: Duration,

    /// Requests executed by one batch call
    #[serde(default = "default_count_per_batch")]
    pub count_per_batch: u32,

    /// Ideal full pool rounds per ramp step before budget scaling
    #[serde(default = "default_rounds_per_step")]
    pub rounds_per_step: u32,

    /// Error rate at/above which a step counts toward smart-stop
    #[serde(default = "default_smart_stop_error_rate")]
    pub smart_stop_error_rate: f64,

    /// Consecutive bad steps required before the run halts early
    #[serde(default = "default_smart_stop_consecutive")]
    pub smart_stop_consecutive_steps: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            launch_jitter: default_launch_jitter(),
            overload_min_samples: default_overload_min_samples(),
            overload_p95: default_overload_p95(),
            count_per_batch: default_count_per_batch(),
            rounds_per_step: default_rounds_per_step(),
            smart_stop_error_rate: default_smart_stop_error_rate(),
            smart_stop_consecutive_steps: default_smart_stop_consecutive(),
        }
    }
}

impl Validatable for LoadConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.pool_size, "pool_size", self.domain_name())?;
        validate_positive(
            self.overload_min_samples,
            "overload_min_samples",
            self.domain_name(),
        )?;
        validate_positive(
            self.overload_p95.as_millis(),
            "overload_p95",
            self.domain_name(),
        )?;
        validate_positive(self.count_per_batch, "count_per_batch", self.domain_name())?;
        validate_positive(self.rounds_per_step, "rounds_per_step", self.domain_name())?;
        validate_fraction(
            self.smart_stop_error_rate,
            "smart_stop_error_rate",
            self.domain_name(),
        )?;
        validate_positive(
            self.smart_stop_consecutive_steps,
            "smart_stop_consecutive_steps",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load"
    }
}

// Default value functions
fn default_pool_size() -> usize {
    6
}

fn default_launch_jitter() -> Duration {
    Duration::from_millis(150)
}

fn default_overload_min_samples() -> usize {
    12
}

fn default_overload_p95() -> Duration {
    Duration::from_secs(8)
}

fn default_count_per_batch() -> u32 {
    50
}

fn default_rounds_per_step() -> u32 {
    4
}

fn default_smart_stop_error_rate() -> f64 {
    0.9
}

fn default_smart_stop_consecutive() -> u32 {
    2
}
