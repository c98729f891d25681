use clap::Args;
use salesplan_core::{project_target_total, Projection, Scenario};
use serde_json::json;

use crate::commands::CommandResult;

#[derive(Debug, Clone, Args)]
pub struct ProjectRequest {
    #[arg(long, allow_negative_numbers = true, help = "Total sales of the prior year")]
    pub prior_total: f64,
    #[arg(long, allow_negative_numbers = true, help = "Total sales of the current year")]
    pub current_total: f64,
    #[arg(long, help = "Single scenario to project; all three when omitted")]
    pub scenario: Option<Scenario>,
}

pub fn run(request: &ProjectRequest) -> CommandResult {
    let scenarios = match request.scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };

    let projections: Vec<Projection> = scenarios
        .into_iter()
        .map(|scenario| {
            project_target_total(request.prior_total, request.current_total, scenario)
        })
        .collect();
    let warnings: Vec<_> = projections.iter().filter_map(Projection::warning).take(1).collect();

    let message = projections
        .iter()
        .map(|projection| format!("{}={:.2}", projection.scenario, projection.projected_total))
        .collect::<Vec<_>>()
        .join(", ");

    CommandResult::success_with_data(
        "project",
        message,
        Some(json!({ "projections": projections, "warnings": warnings })),
    )
}
