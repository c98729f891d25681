pub mod analytics;
pub mod budget;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ingest;
pub mod naming;

pub use analytics::concentration::{
    client_concentration, gini, pareto, ClientConcentration, ParetoSummary,
};
pub use analytics::portfolio::{
    classify_quadrants, client_retention, growth_contributions, ClientRetention,
    GrowthContribution, Quadrant, QuadrantAssignment,
};
pub use budget::{
    compute_budget, compute_monthly_plan, project_target_total, BudgetEngine, BudgetPlan,
    DeterministicBudgetEngine, GroupMembership, MonthlyPlan, Projection, Scenario,
};
pub use config::{AppConfig, BudgetSettings, ConfigError, LoadOptions};
pub use domain::budget::{
    BudgetAllocation, GroupAllocation, MonthlyAllocation, MonthlyWeightProfile,
    SalespersonAggregate, ScoredSalesperson, WeightSource,
};
pub use domain::sales::{Month, SalesRecord, SalespersonId};
pub use errors::{ApplicationError, BudgetWarning, DomainError, InterfaceError};
pub use ingest::{ingest_json, ColumnMapping, IngestError, IngestReport};
