pub mod analyze;
pub mod budget;
pub mod config;
pub mod monthly;
pub mod project;
pub mod report;

use std::path::{Path, PathBuf};

use clap::Args;
use salesplan_core::budget::projection::project_from_records;
use salesplan_core::config::{AppConfig, LoadOptions};
use salesplan_core::errors::{ApplicationError, InterfaceError};
use salesplan_core::{
    BudgetEngine, BudgetPlan, BudgetWarning, DeterministicBudgetEngine, IngestReport, Projection,
    Scenario,
};
use serde::Serialize;
use serde_json::Value;

use crate::input;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &InterfaceError) -> Self {
        Self::failure(
            command,
            error.error_class(),
            format!("{} ({error})", error.user_message()),
            error.exit_code(),
        )
    }

    /// Plain-text output, for commands whose product is a document.
    pub fn raw(output: String) -> Self {
        Self { exit_code: 0, output }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Inputs shared by every command that plans from a records file.
#[derive(Debug, Clone, Args)]
pub struct PlanRequest {
    #[arg(long, help = "JSON array of sales rows")]
    pub records: PathBuf,
    #[arg(long = "prior", help = "Prior comparison year")]
    pub year_prior: i32,
    #[arg(long = "current", help = "Current comparison year")]
    pub year_current: i32,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Company target for the plan year; projected from history when omitted"
    )]
    pub target: Option<f64>,
    #[arg(long, help = "Projection scenario: conservative, realistic or optimistic")]
    pub scenario: Option<Scenario>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TargetResolution {
    Explicit { total: f64 },
    Projected { total: f64, projection: Projection },
}

impl TargetResolution {
    pub fn total(&self) -> f64 {
        match self {
            Self::Explicit { total } | Self::Projected { total, .. } => *total,
        }
    }

    pub fn warning(&self) -> Option<BudgetWarning> {
        match self {
            Self::Explicit { .. } => None,
            Self::Projected { projection, .. } => projection.warning(),
        }
    }
}

/// Everything a planning command needs after config, input and engine ran.
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub config: AppConfig,
    pub ingest: IngestReport,
    pub target: TargetResolution,
    pub plan: BudgetPlan,
}

#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub rows_rejected: usize,
    pub amounts_coerced: usize,
    pub errors: Vec<String>,
}

impl From<&IngestReport> for IngestSummary {
    fn from(report: &IngestReport) -> Self {
        Self {
            rows_read: report.rows_read,
            rows_rejected: report.rows_rejected,
            amounts_coerced: report.amounts_coerced,
            errors: report.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

pub fn load_config(options: &LoadOptions) -> Result<AppConfig, InterfaceError> {
    AppConfig::load(options.clone()).map_err(|error| ApplicationError::from(error).into())
}

pub fn load_records(path: &Path, config: &AppConfig) -> Result<IngestReport, InterfaceError> {
    input::read_records(path, &config.ingest).map_err(|error| {
        InterfaceError::from(ApplicationError::Input(format!("{error:#}")))
    })
}

pub fn resolve_target(
    request: &PlanRequest,
    config: &AppConfig,
    ingest: &IngestReport,
) -> TargetResolution {
    match request.target {
        Some(total) => TargetResolution::Explicit { total },
        None => {
            let scenario = request.scenario.unwrap_or(config.budget.default_scenario);
            let projection = project_from_records(
                &ingest.records,
                request.year_prior,
                request.year_current,
                scenario,
            );
            TargetResolution::Projected { total: projection.projected_total, projection }
        }
    }
}

pub fn prepare_plan(
    options: &LoadOptions,
    request: &PlanRequest,
) -> Result<PlanContext, InterfaceError> {
    let config = load_config(options)?;
    let ingest = load_records(&request.records, &config)?;
    let target = resolve_target(request, &config, &ingest);

    let engine = DeterministicBudgetEngine::from_config(&config);
    let mut plan = engine
        .compute_budget(
            &ingest.records,
            request.year_prior,
            request.year_current,
            target.total(),
        )
        .map_err(|error| InterfaceError::from(ApplicationError::from(error)))?;
    if let Some(warning) = target.warning() {
        plan.warnings.insert(0, warning);
    }

    Ok(PlanContext { config, ingest, target, plan })
}
