//! Ramp ladder construction and budget allocation
//!
//! Concurrency milestones are fixed; a run's ladder is the milestones
//! below its target plus the target itself. Allocation starts from an
//! ideal of several full rounds per step and scales down proportionally
//! when the total request budget cannot cover it. Steps scaled below one
//! full round carry too little signal to keep, except the final step,
//! which is the whole point of the run and is always kept at a floor.

use surge_core::RampStep;

/// Fixed concurrency milestone ladder
pub const CONCURRENCY_MILESTONES: &[u32] = &[
    10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000, 100_000,
];

/// Milestones below the target, then the target itself.
pub fn build_ladder(target: u32) -> Vec<u32> {
    let mut ladder: Vec<u32> = CONCURRENCY_MILESTONES
        .iter()
        .copied()
        .filter(|&m| m < target)
        .collect();
    ladder.push(target);
    ladder
}

/// Distribute `budget` requests over the ladder for `target` concurrency.
pub fn plan_steps(target: u32, budget: u64, rounds_per_step: u32) -> Vec<RampStep> {
    let ladder = build_ladder(target);

    let ideals: Vec<u64> = ladder
        .iter()
        .map(|&concurrency| concurrency as u64 * rounds_per_step as u64)
        .collect();
    let total_ideal: u64 = ideals.iter().sum();

    let scale = if total_ideal <= budget {
        1.0
    } else {
        budget as f64 / total_ideal as f64
    };

    let scaled: Vec<RampStep> = ladder
        .iter()
        .zip(&ideals)
        .map(|(&concurrency, &ideal)| RampStep {
            concurrency,
            allocation: (ideal as f64 * scale).floor() as u32,
        })
        .collect();

    let last = scaled.len() - 1;
    let mut steps: Vec<RampStep> = scaled[..last]
        .iter()
        .copied()
        .filter(|step| step.allocation as u64 >= step.concurrency as u64)
        .collect();

    // The final (target) step survives any budget squeeze. Its floor is
    // one full round, capped by whatever budget the kept steps left.
    let spent: u64 = steps.iter().map(|s| s.allocation as u64).sum();
    let remaining = budget.saturating_sub(spent);
    let mut final_step = scaled[last];
    let floor = (final_step.concurrency as u64).min(remaining) as u32;
    final_step.allocation = final_step.allocation.max(floor);
    steps.push(final_step);

    steps
}
