//! Phasing of annual allocations into calendar months.
//!
//! Each salesperson's budget follows their own monthly sales profile in the
//! base year. Without own history the population profile of that year is
//! used, and without any history at all the split is uniform.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::domain::budget::{
    BudgetAllocation, MonthlyAllocation, MonthlyWeightProfile, WeightSource,
};
use crate::domain::sales::{Month, SalesRecord, SalespersonId};
use crate::errors::BudgetWarning;

pub const UNIFORM_WEIGHTS: [f64; Month::COUNT] = [1.0 / 12.0; Month::COUNT];

#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyDistribution {
    pub base_year: Option<i32>,
    pub profiles: Vec<MonthlyWeightProfile>,
    pub entries: Vec<MonthlyAllocation>,
    pub warnings: Vec<BudgetWarning>,
}

/// The preferred year when it has any record, else the most recent year
/// present. `None` for an empty record set.
pub fn base_year(records: &[SalesRecord], preferred: i32) -> Option<i32> {
    if records.iter().any(|record| record.year == preferred) {
        return Some(preferred);
    }
    records.iter().map(|record| record.year).max()
}

/// Fractions of the given records' sales per calendar month, or `None`
/// when they add up to nothing.
pub fn month_shares<'a>(
    records: impl IntoIterator<Item = &'a SalesRecord>,
) -> Option<[f64; Month::COUNT]> {
    let mut totals = [0.0_f64; Month::COUNT];
    for record in records {
        totals[record.month.index()] += record.effective_amount();
    }

    let sum: f64 = totals.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return None;
    }

    Some(totals.map(|value| value / sum))
}

pub fn weight_profiles(
    salespeople: &[SalespersonId],
    records: &[SalesRecord],
    base_year: Option<i32>,
) -> Vec<MonthlyWeightProfile> {
    let Some(year) = base_year else {
        return salespeople
            .iter()
            .map(|id| MonthlyWeightProfile {
                salesperson: id.clone(),
                weights: UNIFORM_WEIGHTS,
                source: WeightSource::Uniform,
            })
            .collect();
    };

    let base_records: Vec<&SalesRecord> =
        records.iter().filter(|record| record.year == year).collect();

    let mut by_salesperson: BTreeMap<SalespersonId, Vec<&SalesRecord>> = BTreeMap::new();
    for record in base_records.iter().copied() {
        by_salesperson.entry(record.salesperson_id()).or_default().push(record);
    }

    let population = month_shares(base_records.iter().copied());

    salespeople
        .iter()
        .map(|id| {
            let own = by_salesperson.get(id).and_then(|own| month_shares(own.iter().copied()));
            let (weights, source) = match (own, population) {
                (Some(weights), _) => (weights, WeightSource::Own),
                (None, Some(weights)) => (weights, WeightSource::Population),
                (None, None) => (UNIFORM_WEIGHTS, WeightSource::Uniform),
            };
            MonthlyWeightProfile { salesperson: id.clone(), weights, source }
        })
        .collect()
}

pub fn distribute_monthly(
    allocations: &[BudgetAllocation],
    records: &[SalesRecord],
    preferred_base_year: i32,
) -> MonthlyDistribution {
    let base_year = base_year(records, preferred_base_year);
    let ids: Vec<SalespersonId> = allocations.iter().map(|entry| entry.id().clone()).collect();
    let profiles = weight_profiles(&ids, records, base_year);

    let mut entries = Vec::with_capacity(allocations.len() * Month::COUNT);
    let mut warnings = Vec::new();

    for (allocation, profile) in allocations.iter().zip(&profiles) {
        if profile.source != WeightSource::Own {
            info!(
                event_name = "budget.monthly.fallback",
                salesperson = %profile.salesperson,
                fallback = profile.source.as_str(),
                "no own monthly history in base year; using fallback profile"
            );
            warnings.push(BudgetWarning::MissingMonthlyHistory {
                salesperson: profile.salesperson.to_string(),
                fallback: profile.source,
            });
        }

        for month in Month::all() {
            let weight = profile.weights[month.index()];
            entries.push(MonthlyAllocation {
                salesperson: profile.salesperson.clone(),
                month,
                weight,
                amount: allocation.allocation * weight,
                source: profile.source,
            });
        }
    }

    debug!(
        event_name = "budget.monthly.completed",
        base_year = base_year.unwrap_or_default(),
        salespeople = profiles.len(),
        fallbacks = warnings.len(),
        "distributed annual allocations across months"
    );

    MonthlyDistribution { base_year, profiles, entries, warnings }
}
