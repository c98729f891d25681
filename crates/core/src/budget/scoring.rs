//! Performance scoring for budget allocation.
//!
//! The score combines trailing sales, clamped year-over-year growth and a
//! portfolio diversity index. Diversity is relative: it is min-max scaled
//! across the population being budgeted, so adding or removing a salesperson
//! changes everyone else's index.

use crate::config::BudgetSettings;
use crate::domain::budget::{SalespersonAggregate, ScoredSalesperson};

/// (current - prior) / prior, or 0 without a positive prior year.
pub fn growth_rate(prior_total: f64, current_total: f64) -> f64 {
    if prior_total > 0.0 && prior_total.is_finite() && current_total.is_finite() {
        (current_total - prior_total) / prior_total
    } else {
        0.0
    }
}

pub fn clamp_growth(rate: f64, settings: &BudgetSettings) -> f64 {
    clamp(rate, settings.growth_floor, settings.growth_ceiling)
}

/// Min-max scaling into [0, 1]; 0 when the population has no spread.
pub fn min_max_normalize(value: f64, min: f64, max: f64) -> f64 {
    let spread = max - min;
    if spread > 0.0 && spread.is_finite() {
        clamp((value - min) / spread, 0.0, 1.0)
    } else {
        0.0
    }
}

pub fn score(
    aggregates: &[SalespersonAggregate],
    settings: &BudgetSettings,
) -> Vec<ScoredSalesperson> {
    let (line_min, line_max) = bounds(aggregates.iter().map(|entry| entry.product_lines as f64));
    let (client_min, client_max) = bounds(aggregates.iter().map(|entry| entry.clients as f64));

    aggregates
        .iter()
        .map(|aggregate| {
            let growth = growth_rate(aggregate.prior_total, aggregate.current_total);
            let clamped_growth = clamp_growth(growth, settings);

            let diversity_index = clamp(
                settings.product_line_weight
                    * min_max_normalize(aggregate.product_lines as f64, line_min, line_max)
                    + settings.client_weight
                        * min_max_normalize(aggregate.clients as f64, client_min, client_max),
                0.0,
                1.0,
            );

            let raw_score = aggregate.current_total
                * (1.0 + clamped_growth)
                * (1.0 + settings.diversity_boost * diversity_index);

            ScoredSalesperson {
                aggregate: aggregate.clone(),
                growth_rate: growth,
                clamped_growth,
                diversity_index,
                raw_score: if raw_score.is_finite() { raw_score.max(0.0) } else { 0.0 },
            }
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
        (min.min(value), max.max(value))
    })
}

// f64::clamp panics on inverted bounds; settings built by hand may not be validated.
fn clamp(value: f64, low: f64, high: f64) -> f64 {
    value.max(low).min(high)
}
