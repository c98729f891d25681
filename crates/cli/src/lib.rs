pub mod commands;
pub mod input;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use salesplan_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig};
use salesplan_core::Scenario;
use tracing_subscriber::EnvFilter;

use crate::commands::analyze::AnalyzeRequest;
use crate::commands::project::ProjectRequest;
use crate::commands::report::ReportRequest;
use crate::commands::PlanRequest;

#[derive(Debug, Parser)]
#[command(
    name = "salesplan",
    about = "Sales budget planning CLI",
    long_about = "Allocate a company sales target across salespeople, phase it by month, \
                  consolidate it by group, and project next year's target.",
    after_help = "Examples:\n  salesplan budget --records ventas.json --prior 2024 --current 2025 --target 1200000\n  salesplan monthly --records ventas.json --prior 2024 --current 2025 --scenario conservative\n  salesplan project --prior-total 1000000 --current-total 1150000\n  salesplan config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to salesplan.toml (required to exist when given)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override logging.format (compact|pretty|json)")]
    log_format: Option<LogFormat>,
    #[arg(long, global = true, help = "Override budget.default_scenario")]
    default_scenario: Option<Scenario>,
    #[arg(long, global = true, help = "Override budget.floor_ratio")]
    floor_ratio: Option<f64>,
    #[arg(long, global = true, help = "Override budget.ceiling_ratio")]
    ceiling_ratio: Option<f64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Allocate the annual target across salespeople and groups")]
    Budget(PlanRequest),
    #[command(about = "Phase the annual allocation into calendar months")]
    Monthly(PlanRequest),
    #[command(about = "Project next year's company target from two year totals")]
    Project(ProjectRequest),
    #[command(about = "Client concentration, portfolio quadrants, retention and growth mix")]
    Analyze(AnalyzeRequest),
    #[command(about = "Render the budget plan as a Markdown report")]
    Report(ReportRequest),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                log_level: self.log_level.clone(),
                log_format: self.log_format,
                default_scenario: self.default_scenario,
                floor_ratio: self.floor_ratio,
                ceiling_ratio: self.ceiling_ratio,
            },
        }
    }
}

/// Logs go to stderr; stdout carries only command output.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    // Config errors are reported by the command itself; logging falls back to defaults.
    let logging = AppConfig::load(options.clone())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init_logging(&logging);

    let result = match &cli.command {
        Command::Budget(request) => commands::budget::run(&options, request),
        Command::Monthly(request) => commands::monthly::run(&options, request),
        Command::Project(request) => commands::project::run(request),
        Command::Analyze(request) => commands::analyze::run(&options, request),
        Command::Report(request) => commands::report::run(&options, request),
        Command::Config => commands::config::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
