//! Surge execution tier
//!
//! One batch call enters here with a verified count and leaves as a
//! merged `BatchResult`: the regional dispatcher splits the count across
//! execution sites, each site drains its share through a constant-size
//! concurrency pool, and the results are folded back together. The quota
//! tracker and cancellation registry hold the only per-run mutable state
//! on this tier.

pub mod cancel;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod quota;
pub mod regions;

// Re-export main types
pub use cancel::{CancelToken, CancellationRegistry};
pub use dispatch::{split_allocations, LocalSiteRunner, RegionalDispatcher, SiteRunner};
pub use error::ExecutionError;
pub use pool::{BatchPoolRunner, PoolConfig};
pub use quota::QuotaTracker;
pub use regions::{regions_for_count, Region, REGIONS};
