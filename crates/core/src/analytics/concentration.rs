//! How evenly a salesperson's sales are spread across clients.
//!
//! 1. **Gini** over client totals: 0 is perfectly even, values near 1 mean
//!    one client carries the book.
//! 2. **Pareto**: how many top clients reach 80% of sales.
//! 3. **HHI** on the 0..=10000 scale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::sales::{SalesRecord, SalespersonId};

pub const PARETO_THRESHOLD: f64 = 0.80;
/// HHI above this marks a highly concentrated client book.
pub const HHI_CONCENTRATION_THRESHOLD: f64 = 2500.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParetoSummary {
    pub threshold: f64,
    pub items: usize,
    /// Top items needed to reach `threshold` of the total.
    pub needed: usize,
    pub ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConcentration {
    pub salesperson: SalespersonId,
    pub clients: usize,
    pub total: f64,
    pub gini: f64,
    pub hhi: f64,
    pub concentrated: bool,
    pub pareto_clients: usize,
    pub pareto_ratio: f64,
    pub top_client_share: f64,
}

/// Gini coefficient of non-negative values. Empty or zero-sum input is 0.
pub fn gini(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().map(non_negative).collect();
    let total: f64 = sorted.iter().sum();
    if sorted.is_empty() || total <= 0.0 {
        return 0.0;
    }

    sorted.sort_by(f64::total_cmp);
    let count = sorted.len() as f64;
    let weighted: f64 =
        sorted.iter().enumerate().map(|(index, value)| (index as f64 + 1.0) * value).sum();

    (2.0 * weighted) / (count * total) - (count + 1.0) / count
}

pub fn pareto(values: &[f64], threshold: f64) -> ParetoSummary {
    let mut sorted: Vec<f64> = values.iter().copied().map(non_negative).collect();
    sorted.sort_by(|left, right| right.total_cmp(left));
    let total: f64 = sorted.iter().sum();
    let items = sorted.len();

    if total <= 0.0 {
        return ParetoSummary { threshold, items, needed: 0, ratio: 0.0 };
    }

    let goal = threshold * total;
    let tolerance = total * 1e-9;
    let mut cumulative = 0.0;
    let mut needed = items;
    for (index, value) in sorted.iter().enumerate() {
        cumulative += value;
        if cumulative + tolerance >= goal {
            needed = index + 1;
            break;
        }
    }

    ParetoSummary { threshold, items, needed, ratio: needed as f64 / items as f64 }
}

/// Herfindahl-Hirschman index: sum of squared percentage shares.
pub fn hhi(values: &[f64]) -> f64 {
    let total: f64 = values.iter().copied().map(non_negative).sum();
    if total <= 0.0 {
        return 0.0;
    }
    values
        .iter()
        .map(|value| {
            let share = non_negative(*value) / total * 100.0;
            share * share
        })
        .sum()
}

/// Per-salesperson client concentration for one year. Records without a
/// client are left out.
pub fn client_concentration(records: &[SalesRecord], year: i32) -> Vec<ClientConcentration> {
    let mut books: BTreeMap<SalespersonId, BTreeMap<&str, f64>> = BTreeMap::new();
    for record in records.iter().filter(|record| record.year == year) {
        let client = record.client.trim();
        let id = record.salesperson_id();
        if client.is_empty() || id.as_str().is_empty() {
            continue;
        }
        *books.entry(id).or_default().entry(client).or_default() += record.effective_amount();
    }

    let summaries: Vec<ClientConcentration> = books
        .into_iter()
        .map(|(salesperson, book)| {
            let values: Vec<f64> = book.into_values().collect();
            let total: f64 = values.iter().sum();
            let pareto = pareto(&values, PARETO_THRESHOLD);
            let hhi = hhi(&values);
            let top = values.iter().copied().fold(0.0, f64::max);
            ClientConcentration {
                salesperson,
                clients: values.len(),
                total,
                gini: gini(&values),
                hhi,
                concentrated: hhi > HHI_CONCENTRATION_THRESHOLD,
                pareto_clients: pareto.needed,
                pareto_ratio: pareto.ratio,
                top_client_share: if total > 0.0 { top / total } else { 0.0 },
            }
        })
        .collect();

    debug!(
        event_name = "analytics.concentration.completed",
        year,
        salespeople = summaries.len(),
        "computed client concentration"
    );

    summaries
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
