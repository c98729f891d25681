//! Budget allocation engine
//!
//! Pure pipeline over a snapshot of sales records:
//! aggregate -> score -> allocate -> (monthly phasing, group consolidation).
//! Every call recomputes from its inputs; identical inputs give identical
//! outputs.

pub mod aggregate;
pub mod allocator;
pub mod groups;
pub mod monthly;
pub mod projection;
pub mod scoring;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AppConfig, BudgetSettings};
use crate::domain::budget::{
    BudgetAllocation, GroupAllocation, MonthlyAllocation, MonthlyWeightProfile,
};
use crate::domain::sales::{Month, SalesRecord, SalespersonId};
use crate::errors::{BudgetWarning, DomainError};

pub use aggregate::aggregate;
pub use allocator::{allocate, AllocationOutcome};
pub use groups::{consolidate, GroupIndex, GroupMembership};
pub use monthly::distribute_monthly;
pub use projection::{project_target_total, Projection, Scenario};
pub use scoring::score;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    pub year_prior: i32,
    pub year_current: i32,
    pub target_total: f64,
    pub allocations: Vec<BudgetAllocation>,
    pub groups: Vec<GroupAllocation>,
    pub warnings: Vec<BudgetWarning>,
}

impl BudgetPlan {
    pub fn total_allocated(&self) -> f64 {
        self.allocations.iter().map(|entry| entry.allocation).sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.allocations.iter().all(|entry| entry.allocation == 0.0)
    }

    pub fn allocation_for(&self, id: &SalespersonId) -> Option<&BudgetAllocation> {
        self.allocations.iter().find(|entry| entry.id() == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPlan {
    pub base_year: Option<i32>,
    pub profiles: Vec<MonthlyWeightProfile>,
    pub entries: Vec<MonthlyAllocation>,
    pub warnings: Vec<BudgetWarning>,
}

impl MonthlyPlan {
    pub fn for_salesperson<'a>(
        &'a self,
        id: &'a SalespersonId,
    ) -> impl Iterator<Item = &'a MonthlyAllocation> + 'a {
        self.entries.iter().filter(move |entry| &entry.salesperson == id)
    }

    /// Company-wide budget per calendar month.
    pub fn month_totals(&self) -> [f64; Month::COUNT] {
        let mut totals = [0.0; Month::COUNT];
        for entry in &self.entries {
            totals[entry.month.index()] += entry.amount;
        }
        totals
    }
}

pub fn compute_budget(
    records: &[SalesRecord],
    year_prior: i32,
    year_current: i32,
    target_total: f64,
    settings: &BudgetSettings,
    membership: &GroupMembership,
) -> Result<BudgetPlan, DomainError> {
    if year_prior == year_current {
        return Err(DomainError::SameComparisonYears { year: year_prior });
    }

    let aggregates = aggregate(records, year_prior, year_current);
    let scored = score(&aggregates, settings);
    let AllocationOutcome { mut allocations, warnings, .. } =
        allocate(&scored, target_total, settings);
    let index = membership.index();
    groups::label_allocations(&mut allocations, &index);
    let groups = groups::consolidate_indexed(&allocations, &index);

    info!(
        event_name = "budget.plan.completed",
        year_prior,
        year_current,
        target_total,
        salespeople = allocations.len(),
        groups = groups.len(),
        warnings = warnings.len(),
        "budget plan computed"
    );

    Ok(BudgetPlan {
        year_prior,
        year_current,
        target_total,
        allocations,
        groups,
        warnings,
    })
}

/// Monthly phasing of a plan, using the plan's prior year as preferred base.
pub fn compute_monthly_plan(plan: &BudgetPlan, records: &[SalesRecord]) -> MonthlyPlan {
    let distribution = distribute_monthly(&plan.allocations, records, plan.year_prior);
    MonthlyPlan {
        base_year: distribution.base_year,
        profiles: distribution.profiles,
        entries: distribution.entries,
        warnings: distribution.warnings,
    }
}

pub trait BudgetEngine {
    fn compute_budget(
        &self,
        records: &[SalesRecord],
        year_prior: i32,
        year_current: i32,
        target_total: f64,
    ) -> Result<BudgetPlan, DomainError>;

    fn compute_monthly_plan(&self, plan: &BudgetPlan, records: &[SalesRecord]) -> MonthlyPlan;

    fn project_target_total(
        &self,
        total_prior: f64,
        total_current: f64,
        scenario: Scenario,
    ) -> Projection;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicBudgetEngine {
    settings: BudgetSettings,
    membership: GroupMembership,
}

impl DeterministicBudgetEngine {
    pub fn new(settings: BudgetSettings, membership: GroupMembership) -> Self {
        Self { settings, membership }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.budget, config.groups.clone())
    }

    pub fn settings(&self) -> &BudgetSettings {
        &self.settings
    }
}

impl BudgetEngine for DeterministicBudgetEngine {
    fn compute_budget(
        &self,
        records: &[SalesRecord],
        year_prior: i32,
        year_current: i32,
        target_total: f64,
    ) -> Result<BudgetPlan, DomainError> {
        compute_budget(
            records,
            year_prior,
            year_current,
            target_total,
            &self.settings,
            &self.membership,
        )
    }

    fn compute_monthly_plan(&self, plan: &BudgetPlan, records: &[SalesRecord]) -> MonthlyPlan {
        compute_monthly_plan(plan, records)
    }

    fn project_target_total(
        &self,
        total_prior: f64,
        total_current: f64,
        scenario: Scenario,
    ) -> Projection {
        project_target_total(total_prior, total_current, scenario)
    }
}
