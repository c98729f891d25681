use std::path::PathBuf;

use clap::Args;
use salesplan_core::analytics::concentration::client_concentration;
use salesplan_core::analytics::portfolio::{
    classify_quadrants, client_retention, growth_contributions,
};
use salesplan_core::budget::scoring::growth_rate;
use salesplan_core::budget::{aggregate, score};
use salesplan_core::config::LoadOptions;
use salesplan_core::errors::{ApplicationError, DomainError, InterfaceError};
use serde_json::json;

use crate::commands::{load_config, load_records, CommandResult, IngestSummary};

#[derive(Debug, Clone, Args)]
pub struct AnalyzeRequest {
    #[arg(long, help = "JSON array of sales rows")]
    pub records: PathBuf,
    #[arg(long = "prior", help = "Prior comparison year")]
    pub year_prior: i32,
    #[arg(long = "current", help = "Current comparison year")]
    pub year_current: i32,
}

pub fn run(options: &LoadOptions, request: &AnalyzeRequest) -> CommandResult {
    match analyze(options, request) {
        Ok(result) => result,
        Err(error) => CommandResult::from_error("analyze", &error),
    }
}

fn analyze(
    options: &LoadOptions,
    request: &AnalyzeRequest,
) -> Result<CommandResult, InterfaceError> {
    if request.year_prior == request.year_current {
        let error = DomainError::SameComparisonYears { year: request.year_prior };
        return Err(ApplicationError::from(error).into());
    }

    let config = load_config(options)?;
    let ingest = load_records(&request.records, &config)?;
    let records = &ingest.records;

    let aggregates = aggregate(records, request.year_prior, request.year_current);
    let scored = score(&aggregates, &config.budget);
    let quadrants = classify_quadrants(&scored);
    let concentration = client_concentration(records, request.year_current);
    let retention = client_retention(records, request.year_prior, request.year_current);
    let contributions = growth_contributions(records, request.year_prior, request.year_current);

    let total_prior: f64 = contributions.iter().map(|entry| entry.prior_total).sum();
    let total_current: f64 = contributions.iter().map(|entry| entry.current_total).sum();
    let total_growth = growth_rate(total_prior, total_current);

    let message = format!(
        "analyzed {} salespeople and {} product lines (total growth {:.2}%)",
        scored.len(),
        contributions.len(),
        total_growth * 100.0
    );
    let data = json!({
        "ingest": IngestSummary::from(&ingest),
        "total_growth": total_growth,
        "quadrants": quadrants,
        "concentration": concentration,
        "retention": retention,
        "growth_contributions": contributions,
    });

    Ok(CommandResult::success_with_data("analyze", message, Some(data)))
}
