use salesplan_core::config::LoadOptions;
use salesplan_core::{BudgetEngine, DeterministicBudgetEngine};
use serde_json::json;

use crate::commands::{prepare_plan, CommandResult, PlanRequest};

pub fn run(options: &LoadOptions, request: &PlanRequest) -> CommandResult {
    let context = match prepare_plan(options, request) {
        Ok(context) => context,
        Err(error) => return CommandResult::from_error("monthly", &error),
    };

    let engine = DeterministicBudgetEngine::from_config(&context.config);
    let monthly = engine.compute_monthly_plan(&context.plan, &context.ingest.records);

    let base_year = monthly
        .base_year
        .map(|year| year.to_string())
        .unwrap_or_else(|| "none (uniform split)".to_string());
    let message = format!(
        "phased {} salespeople over 12 months (base year {base_year})",
        monthly.profiles.len()
    );
    let data = json!({
        "target": context.target,
        "month_totals": monthly.month_totals(),
        "monthly": monthly,
        "plan_warnings": context.plan.warnings,
    });

    CommandResult::success_with_data("monthly", message, Some(data))
}
