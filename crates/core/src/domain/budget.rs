use serde::{Deserialize, Serialize};

use crate::domain::sales::{Month, SalespersonId};

/// Per-salesperson totals over the two comparison years.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalespersonAggregate {
    pub id: SalespersonId,
    pub name: String,
    pub prior_total: f64,
    pub current_total: f64,
    pub clients: usize,
    pub product_lines: usize,
    pub brands: usize,
    /// Current-year share of the population's current-year total.
    pub share: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredSalesperson {
    #[serde(flatten)]
    pub aggregate: SalespersonAggregate,
    pub growth_rate: f64,
    pub clamped_growth: f64,
    pub diversity_index: f64,
    pub raw_score: f64,
}

/// Final annual budget for one salesperson.
///
/// `band_floor..=band_ceiling` is the volatility band applied before the
/// rescale step. The rescale may move `allocation` outside of it, in which
/// case `within_band` is false.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    #[serde(flatten)]
    pub scored: ScoredSalesperson,
    pub preliminary: f64,
    pub band_floor: f64,
    pub band_ceiling: f64,
    pub clamped: f64,
    pub allocation: f64,
    pub within_band: bool,
    pub group: String,
}

impl BudgetAllocation {
    pub fn id(&self) -> &SalespersonId {
        &self.scored.aggregate.id
    }

    pub fn aggregate(&self) -> &SalespersonAggregate {
        &self.scored.aggregate
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Own,
    Population,
    Uniform,
}

impl WeightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Own => "own",
            Self::Population => "population",
            Self::Uniform => "uniform",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyWeightProfile {
    pub salesperson: SalespersonId,
    pub weights: [f64; Month::COUNT],
    pub source: WeightSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAllocation {
    pub salesperson: SalespersonId,
    pub month: Month,
    pub weight: f64,
    pub amount: f64,
    pub source: WeightSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupAllocation {
    pub group: String,
    pub members: Vec<SalespersonId>,
    pub allocation: f64,
    pub prior_total: f64,
    pub current_total: f64,
    pub clients: usize,
}
