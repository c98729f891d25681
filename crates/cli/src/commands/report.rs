use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use salesplan_core::config::LoadOptions;
use salesplan_core::{BudgetEngine, BudgetWarning, DeterministicBudgetEngine};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::info;

use crate::commands::{prepare_plan, CommandResult, PlanContext, PlanRequest, TargetResolution};

const REPORT_TEMPLATE_NAME: &str = "budget_report.md";
const REPORT_TEMPLATE: &str = include_str!("../../templates/budget_report.md.tera");

#[derive(Debug, Clone, Args)]
pub struct ReportRequest {
    #[command(flatten)]
    pub plan: PlanRequest,
    #[arg(long, help = "Write the report to this file instead of stdout")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ReportView {
    year_prior: i32,
    year_current: i32,
    target: f64,
    target_source: &'static str,
    scenario: Option<String>,
    total_allocated: f64,
    base_year: Option<i32>,
    allocations: Vec<AllocationRow>,
    groups: Vec<GroupRow>,
    months: Vec<MonthRow>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AllocationRow {
    name: String,
    group: String,
    prior_total: f64,
    current_total: f64,
    growth: f64,
    diversity: f64,
    allocation: f64,
    within_band: bool,
}

#[derive(Debug, Serialize)]
struct GroupRow {
    group: String,
    members: Vec<String>,
    allocation: f64,
}

#[derive(Debug, Serialize)]
struct MonthRow {
    month: String,
    amount: f64,
}

pub fn run(options: &LoadOptions, request: &ReportRequest) -> CommandResult {
    let context = match prepare_plan(options, &request.plan) {
        Ok(context) => context,
        Err(error) => return CommandResult::from_error("report", &error),
    };

    let markdown = match render_report(&context) {
        Ok(markdown) => markdown,
        Err(error) => {
            return CommandResult::failure("report", "render", format!("{error:?}"), 1);
        }
    };

    let Some(path) = &request.output else {
        return CommandResult::raw(markdown);
    };

    if let Err(error) = fs::write(path, &markdown) {
        return CommandResult::failure(
            "report",
            "output",
            format!("could not write report to `{}`: {error}", path.display()),
            3,
        );
    }

    info!(
        event_name = "cli.report.written",
        path = %path.display(),
        bytes = markdown.len(),
        "budget report written"
    );
    CommandResult::success("report", format!("report written to {}", path.display()))
}

pub fn render_report(context: &PlanContext) -> tera::Result<String> {
    let mut tera = Tera::default();
    register_template_filters(&mut tera);
    tera.add_raw_template(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)?;

    let view = build_view(context);
    tera.render(REPORT_TEMPLATE_NAME, &Context::from_serialize(&view)?)
}

fn build_view(context: &PlanContext) -> ReportView {
    let plan = &context.plan;
    let engine = DeterministicBudgetEngine::from_config(&context.config);
    let monthly = engine.compute_monthly_plan(plan, &context.ingest.records);

    let (target_source, scenario) = match &context.target {
        TargetResolution::Explicit { .. } => ("explicit", None),
        TargetResolution::Projected { projection, .. } => {
            ("projected", Some(projection.scenario.to_string()))
        }
    };

    let mut warnings: Vec<String> = plan.warnings.iter().map(describe_warning).collect();
    warnings.extend(monthly.warnings.iter().map(describe_warning));

    ReportView {
        year_prior: plan.year_prior,
        year_current: plan.year_current,
        target: plan.target_total,
        target_source,
        scenario,
        total_allocated: plan.total_allocated(),
        base_year: monthly.base_year,
        allocations: plan
            .allocations
            .iter()
            .map(|entry| AllocationRow {
                name: entry.aggregate().name.clone(),
                group: entry.group.clone(),
                prior_total: entry.aggregate().prior_total,
                current_total: entry.aggregate().current_total,
                growth: entry.scored.clamped_growth,
                diversity: entry.scored.diversity_index,
                allocation: entry.allocation,
                within_band: entry.within_band,
            })
            .collect(),
        groups: plan
            .groups
            .iter()
            .map(|group| GroupRow {
                group: group.group.clone(),
                members: group.members.iter().map(ToString::to_string).collect(),
                allocation: group.allocation,
            })
            .collect(),
        months: monthly
            .month_totals()
            .iter()
            .enumerate()
            .map(|(index, amount)| MonthRow { month: format!("{:02}", index + 1), amount: *amount })
            .collect(),
        warnings,
    }
}

fn describe_warning(warning: &BudgetWarning) -> String {
    let detail = match warning {
        BudgetWarning::InsufficientData { detail } => detail.clone(),
        BudgetWarning::InvalidTarget { value } => {
            format!("target {value} is not usable; nothing was allocated")
        }
        BudgetWarning::DegenerateProjection { total_prior, total_current } => format!(
            "totals {total_prior} and {total_current} cannot support a growth projection"
        ),
        BudgetWarning::MissingMonthlyHistory { salesperson, fallback } => {
            format!("{salesperson} has no base-year months; {} profile used", fallback.as_str())
        }
    };
    format!("{}: {detail}", warning.code())
}

/// Register custom Tera filters used by the report template.
///
/// - `money`: 2 decimals, half away from zero, with thousands separators
/// - `pct`:   ratio as a percentage with one decimal
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
    tera.register_filter("pct", tera_pct_filter);
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(format_money(number_of(value))))
}

fn tera_pct_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(format!("{:.1}%", number_of(value) * 100.0)))
}

fn number_of(value: &tera::Value) -> f64 {
    match value {
        tera::Value::Number(number) => number.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn format_money(value: f64) -> String {
    let rounded = Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{rounded:.2}");
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{grouped}.{fraction}")
}
