use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::sales::SalesRecord;
use crate::errors::BudgetWarning;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    #[serde(alias = "conservador")]
    Conservative,
    #[serde(alias = "realista", alias = "base")]
    Realistic,
    #[serde(alias = "optimista")]
    Optimistic,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported scenario `{0}` (expected conservative|realistic|optimistic)")]
pub struct ParseScenarioError(pub String);

impl Scenario {
    pub const ALL: [Scenario; 3] = [Self::Conservative, Self::Realistic, Self::Optimistic];

    /// Multiplier applied to the historical growth rate.
    pub fn growth_factor(&self) -> f64 {
        match self {
            Self::Conservative => 0.8,
            Self::Realistic => 1.0,
            Self::Optimistic => 1.2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Realistic => "realistic",
            Self::Optimistic => "optimistic",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scenario {
    type Err = ParseScenarioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "conservative" | "conservador" => Ok(Self::Conservative),
            "realistic" | "realista" | "base" => Ok(Self::Realistic),
            "optimistic" | "optimista" => Ok(Self::Optimistic),
            other => Err(ParseScenarioError(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub scenario: Scenario,
    pub total_prior: f64,
    pub total_current: f64,
    pub historical_growth: f64,
    pub applied_growth_rate: f64,
    pub projected_total: f64,
    pub degenerate: bool,
}

impl Projection {
    pub fn warning(&self) -> Option<BudgetWarning> {
        self.degenerate.then(|| BudgetWarning::DegenerateProjection {
            total_prior: self.total_prior,
            total_current: self.total_current,
        })
    }
}

/// Next-year target from the two trailing year totals.
///
/// Either total at or below zero (or not finite) yields the current total
/// unchanged with a zero applied rate.
pub fn project_target_total(
    total_prior: f64,
    total_current: f64,
    scenario: Scenario,
) -> Projection {
    let usable = total_prior.is_finite()
        && total_current.is_finite()
        && total_prior > 0.0
        && total_current > 0.0;

    if !usable {
        warn!(
            event_name = "budget.projection.degenerate",
            total_prior,
            total_current,
            scenario = scenario.as_str(),
            "historical totals cannot support a growth projection"
        );
        return Projection {
            scenario,
            total_prior,
            total_current,
            historical_growth: 0.0,
            applied_growth_rate: 0.0,
            projected_total: total_current,
            degenerate: true,
        };
    }

    let historical_growth = (total_current - total_prior) / total_prior;
    let applied_growth_rate = historical_growth * scenario.growth_factor();
    let projected_total = total_current * (1.0 + applied_growth_rate);

    debug!(
        event_name = "budget.projection.completed",
        total_prior,
        total_current,
        scenario = scenario.as_str(),
        applied_growth_rate,
        projected_total,
        "projected target total"
    );

    Projection {
        scenario,
        total_prior,
        total_current,
        historical_growth,
        applied_growth_rate,
        projected_total,
        degenerate: false,
    }
}

/// Sums of sales in each comparison year.
pub fn year_totals(records: &[SalesRecord], year_prior: i32, year_current: i32) -> (f64, f64) {
    records.iter().fold((0.0, 0.0), |(prior, current), record| {
        let amount = record.effective_amount();
        (
            if record.year == year_prior { prior + amount } else { prior },
            if record.year == year_current { current + amount } else { current },
        )
    })
}

pub fn project_from_records(
    records: &[SalesRecord],
    year_prior: i32,
    year_current: i32,
    scenario: Scenario,
) -> Projection {
    let (total_prior, total_current) = year_totals(records, year_prior, year_current);
    project_target_total(total_prior, total_current, scenario)
}
