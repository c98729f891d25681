use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budget::scoring::growth_rate;
use crate::domain::budget::ScoredSalesperson;
use crate::domain::sales::{SalesRecord, SalespersonId};

/// Label used for sales without a product line.
pub const UNASSIGNED_LINE: &str = "unassigned";

/// Growth/share matrix position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    Star,
    CashCow,
    QuestionMark,
    Dog,
}

impl Quadrant {
    pub fn from_position(growing: bool, above_mean_share: bool) -> Self {
        match (growing, above_mean_share) {
            (true, true) => Self::Star,
            (false, true) => Self::CashCow,
            (true, false) => Self::QuestionMark,
            (false, false) => Self::Dog,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Star => "star",
            Self::CashCow => "cash_cow",
            Self::QuestionMark => "question_mark",
            Self::Dog => "dog",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadrantAssignment {
    pub salesperson: SalespersonId,
    pub growth_rate: f64,
    pub share: f64,
    pub quadrant: Quadrant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientRetention {
    pub salesperson: SalespersonId,
    pub prior_clients: usize,
    pub current_clients: usize,
    pub retained: usize,
    pub new_clients: usize,
    pub lost: usize,
    /// Retained over prior clients; 0 without prior clients.
    pub retention_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthContribution {
    pub product_line: String,
    pub prior_total: f64,
    pub current_total: f64,
    pub delta: f64,
    /// Percentage points of total growth explained by this line.
    pub contribution: f64,
}

/// Places each salesperson by growth sign and share relative to the mean
/// share. Share ties with the mean count as above.
pub fn classify_quadrants(scored: &[ScoredSalesperson]) -> Vec<QuadrantAssignment> {
    if scored.is_empty() {
        return Vec::new();
    }

    let mean_share =
        scored.iter().map(|entry| entry.aggregate.share).sum::<f64>() / scored.len() as f64;

    scored
        .iter()
        .map(|entry| {
            let share = entry.aggregate.share;
            QuadrantAssignment {
                salesperson: entry.aggregate.id.clone(),
                growth_rate: entry.growth_rate,
                share,
                quadrant: Quadrant::from_position(entry.growth_rate > 0.0, share >= mean_share),
            }
        })
        .collect()
}

pub fn client_retention(
    records: &[SalesRecord],
    year_prior: i32,
    year_current: i32,
) -> Vec<ClientRetention> {
    let mut cohorts: BTreeMap<SalespersonId, (BTreeSet<&str>, BTreeSet<&str>)> = BTreeMap::new();
    for record in records {
        let client = record.client.trim();
        let id = record.salesperson_id();
        if id.as_str().is_empty() || (record.year != year_prior && record.year != year_current) {
            continue;
        }
        let (prior, current) = cohorts.entry(id).or_default();
        if client.is_empty() {
            continue;
        }
        if record.year == year_prior {
            prior.insert(client);
        } else {
            current.insert(client);
        }
    }

    cohorts
        .into_iter()
        .map(|(salesperson, (prior, current))| {
            let retained = prior.intersection(&current).count();
            ClientRetention {
                salesperson,
                prior_clients: prior.len(),
                current_clients: current.len(),
                retained,
                new_clients: current.len() - retained,
                lost: prior.len() - retained,
                retention_rate: if prior.is_empty() {
                    0.0
                } else {
                    retained as f64 / prior.len() as f64
                },
            }
        })
        .collect()
}

/// Splits total growth between product lines: each line contributes its
/// change over the prior-year company total, so contributions add up to the
/// total growth rate.
pub fn growth_contributions(
    records: &[SalesRecord],
    year_prior: i32,
    year_current: i32,
) -> Vec<GrowthContribution> {
    let mut lines: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for record in records {
        let line = match record.product_line.trim() {
            "" => UNASSIGNED_LINE,
            line => line,
        };
        let amount = record.effective_amount();
        if record.year == year_prior {
            lines.entry(line).or_default().0 += amount;
        } else if record.year == year_current {
            lines.entry(line).or_default().1 += amount;
        }
    }

    let total_prior: f64 = lines.values().map(|(prior, _)| prior).sum();
    let total_current: f64 = lines.values().map(|(_, current)| current).sum();

    let mut contributions: Vec<GrowthContribution> = lines
        .into_iter()
        .map(|(line, (prior_total, current_total))| {
            let delta = current_total - prior_total;
            GrowthContribution {
                product_line: line.to_string(),
                prior_total,
                current_total,
                delta,
                contribution: if total_prior > 0.0 { delta / total_prior } else { 0.0 },
            }
        })
        .collect();
    contributions.sort_by(|left, right| {
        right
            .contribution
            .total_cmp(&left.contribution)
            .then_with(|| left.product_line.cmp(&right.product_line))
    });

    debug!(
        event_name = "analytics.growth_contributions.completed",
        year_prior,
        year_current,
        product_lines = contributions.len(),
        total_growth = growth_rate(total_prior, total_current),
        "decomposed growth by product line"
    );

    contributions
}
