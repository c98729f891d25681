use salesplan_core::config::LoadOptions;
use serde_json::json;
use tracing::info;

use crate::commands::{prepare_plan, CommandResult, IngestSummary, PlanRequest};

pub fn run(options: &LoadOptions, request: &PlanRequest) -> CommandResult {
    let context = match prepare_plan(options, request) {
        Ok(context) => context,
        Err(error) => return CommandResult::from_error("budget", &error),
    };
    let plan = &context.plan;

    info!(
        event_name = "cli.budget.completed",
        salespeople = plan.allocations.len(),
        groups = plan.groups.len(),
        warnings = plan.warnings.len(),
        "budget command completed"
    );

    let message = format!(
        "allocated {:.2} across {} salespeople in {} groups ({} warnings)",
        plan.total_allocated(),
        plan.allocations.len(),
        plan.groups.len(),
        plan.warnings.len()
    );
    let data = json!({
        "target": context.target,
        "ingest": IngestSummary::from(&context.ingest),
        "plan": plan,
    });

    CommandResult::success_with_data("budget", message, Some(data))
}
