//! Score-proportional budget split with a volatility band.
//!
//! Steps, in this order:
//! 1. preliminary = raw score / sum(raw scores) * target
//! 2. clamp into [floor_ratio * current, ceiling_ratio * current]
//! 3. rescale every clamped value by target / sum(clamped)
//!
//! Step 3 restores conservation of the target but can move a value back
//! outside the band from step 2. That is the accepted behavior: global
//! conservation wins over the per-salesperson band. Each allocation records
//! whether it ended up inside its band.

use tracing::{debug, warn};

use crate::config::BudgetSettings;
use crate::domain::budget::{BudgetAllocation, ScoredSalesperson};
use crate::errors::BudgetWarning;

#[derive(Clone, Debug, PartialEq)]
pub struct AllocationOutcome {
    pub allocations: Vec<BudgetAllocation>,
    pub rescale_factor: f64,
    pub warnings: Vec<BudgetWarning>,
}

pub fn allocate(
    scored: &[ScoredSalesperson],
    target_total: f64,
    settings: &BudgetSettings,
) -> AllocationOutcome {
    let mut warnings = Vec::new();

    let target = if target_total.is_finite() && target_total >= 0.0 {
        target_total
    } else {
        warn!(
            event_name = "budget.allocate.invalid_target",
            target_total, "target total is negative or not finite; allocating zero"
        );
        warnings.push(BudgetWarning::InvalidTarget { value: target_total });
        0.0
    };

    let score_total: f64 = scored.iter().map(|entry| entry.raw_score).sum();
    let preliminaries: Vec<f64> = scored
        .iter()
        .map(|entry| {
            if score_total > 0.0 && score_total.is_finite() {
                entry.raw_score / score_total * target
            } else {
                0.0
            }
        })
        .collect();

    let bands: Vec<(f64, f64)> = scored
        .iter()
        .map(|entry| {
            let current = entry.aggregate.current_total.max(0.0);
            (current * settings.floor_ratio, current * settings.ceiling_ratio)
        })
        .collect();

    let clamped: Vec<f64> = preliminaries
        .iter()
        .zip(&bands)
        .map(|(preliminary, (floor, ceiling))| preliminary.max(*floor).min(*ceiling))
        .collect();

    let clamped_total: f64 = clamped.iter().sum();
    let rescale_factor = if clamped_total > 0.0 && clamped_total.is_finite() {
        target / clamped_total
    } else {
        0.0
    };

    let has_sales = scored
        .iter()
        .any(|entry| entry.aggregate.prior_total > 0.0 || entry.aggregate.current_total > 0.0);
    if !has_sales {
        warnings.push(BudgetWarning::InsufficientData {
            detail: "no salesperson has sales in either comparison year".to_string(),
        });
    } else if target > 0.0 && rescale_factor == 0.0 {
        warnings.push(BudgetWarning::InsufficientData {
            detail: "no salesperson has current-year sales to anchor the allocation band"
                .to_string(),
        });
    }

    let allocations: Vec<BudgetAllocation> = scored
        .iter()
        .zip(preliminaries)
        .zip(bands)
        .zip(clamped)
        .map(|(((entry, preliminary), (band_floor, band_ceiling)), clamped)| {
            let allocation = clamped * rescale_factor;
            BudgetAllocation {
                scored: entry.clone(),
                preliminary,
                band_floor,
                band_ceiling,
                clamped,
                allocation,
                within_band: within_band(allocation, band_floor, band_ceiling),
                group: entry.aggregate.id.to_string(),
            }
        })
        .collect();

    let out_of_band = allocations.iter().filter(|entry| !entry.within_band).count();
    if warnings.iter().any(|warning| matches!(warning, BudgetWarning::InsufficientData { .. })) {
        warn!(
            event_name = "budget.allocate.insufficient_data",
            salespeople = allocations.len(),
            target_total = target,
            "allocation produced an all-zero result"
        );
    }
    debug!(
        event_name = "budget.allocate.completed",
        salespeople = allocations.len(),
        target_total = target,
        rescale_factor,
        out_of_band,
        "allocated budget across salespeople"
    );

    AllocationOutcome { allocations, rescale_factor, warnings }
}

fn within_band(value: f64, floor: f64, ceiling: f64) -> bool {
    let tolerance = 1e-9 * ceiling.abs().max(1.0);
    value >= floor - tolerance && value <= ceiling + tolerance
}
