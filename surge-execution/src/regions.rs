//! Execution-site catalog and tiered selection
//!
//! Region selection is a pure function of batch size. Small batches stay
//! in the near tier: egress diversity only pays for itself once the
//! volume amortizes the extra dispatch latency of reaching farther
//! sites.

/// One execution site
#[derive(Debug, PartialEq, Eq)]
pub struct Region {
    pub code: &'static str,
    pub city: &'static str,
    /// Distance tier: 0 = near, higher = farther
    pub tier: u8,
}

/// Static site catalog, ordered by tier
pub const REGIONS: &[Region] = &[
    Region { code: "iad", city: "Ashburn", tier: 0 },
    Region { code: "ord", city: "Chicago", tier: 0 },
    Region { code: "fra", city: "Frankfurt", tier: 1 },
    Region { code: "lhr", city: "London", tier: 1 },
    Region { code: "sin", city: "Singapore", tier: 2 },
    Region { code: "syd", city: "Sydney", tier: 2 },
];

/// Batch sizes at which the next tier is added. A site should get at
/// least two full pool rounds before we pay for a farther hop.
const TIER_THRESHOLDS: &[u32] = &[0, 24, 96];

/// Ordered list of sites to use for a batch of `count` requests.
pub fn regions_for_count(count: u32) -> Vec<&'static Region> {
    let max_tier = TIER_THRESHOLDS
        .iter()
        .rposition(|&threshold| count >= threshold)
        .unwrap_or(0) as u8;

    REGIONS.iter().filter(|r| r.tier <= max_tier).collect()
}
