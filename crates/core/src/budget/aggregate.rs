use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::domain::budget::SalespersonAggregate;
use crate::domain::sales::{SalesRecord, SalespersonId};

#[derive(Default)]
struct Accumulator<'a> {
    name: &'a str,
    prior_total: f64,
    current_total: f64,
    clients: BTreeSet<&'a str>,
    product_lines: BTreeSet<&'a str>,
    brands: BTreeSet<&'a str>,
}

/// Groups records of the two comparison years by salesperson.
///
/// A salesperson with sales in only one of the years gets 0 for the other.
/// Distinct counts cover both years; blank identifiers are not counted.
pub fn aggregate(
    records: &[SalesRecord],
    year_prior: i32,
    year_current: i32,
) -> Vec<SalespersonAggregate> {
    let mut by_salesperson: BTreeMap<SalespersonId, Accumulator<'_>> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        let in_prior = record.year == year_prior;
        let in_current = record.year == year_current;
        if !in_prior && !in_current {
            continue;
        }

        let id = record.salesperson_id();
        if id.as_str().is_empty() {
            skipped += 1;
            continue;
        }

        let entry = by_salesperson.entry(id).or_default();
        if entry.name.is_empty() {
            entry.name = record.salesperson.trim();
        }

        let amount = record.effective_amount();
        if in_prior {
            entry.prior_total += amount;
        }
        if in_current {
            entry.current_total += amount;
        }

        insert_non_blank(&mut entry.clients, &record.client);
        insert_non_blank(&mut entry.product_lines, &record.product_line);
        insert_non_blank(&mut entry.brands, &record.brand);
    }

    let population_current: f64 = by_salesperson.values().map(|entry| entry.current_total).sum();

    let aggregates: Vec<SalespersonAggregate> = by_salesperson
        .into_iter()
        .map(|(id, entry)| SalespersonAggregate {
            id,
            name: entry.name.to_string(),
            prior_total: entry.prior_total,
            current_total: entry.current_total,
            clients: entry.clients.len(),
            product_lines: entry.product_lines.len(),
            brands: entry.brands.len(),
            share: if population_current > 0.0 {
                entry.current_total / population_current
            } else {
                0.0
            },
        })
        .collect();

    debug!(
        event_name = "budget.aggregate.completed",
        year_prior,
        year_current,
        salespeople = aggregates.len(),
        skipped_unnamed = skipped,
        "aggregated sales records by salesperson"
    );

    aggregates
}

fn insert_non_blank<'a>(set: &mut BTreeSet<&'a str>, value: &'a str) {
    let trimmed = value.trim();
    if !trimmed.is_empty() {
        set.insert(trimmed);
    }
}
