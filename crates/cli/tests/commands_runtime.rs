use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use salesplan_cli::commands::analyze::{self, AnalyzeRequest};
use salesplan_cli::commands::project::{self, ProjectRequest};
use salesplan_cli::commands::report::{self, ReportRequest};
use clap::Parser;
use salesplan_cli::commands::{budget, config, monthly, PlanRequest};
use salesplan_cli::Cli;
use salesplan_core::config::LoadOptions;
use salesplan_core::Scenario;
use serde_json::Value;
use tempfile::TempDir;

const RECORDS: &str = r#"[
  {"nomvendedor": "José Pérez", "anio": 2024, "mes": 1, "valor_venta": 100.0,
   "cliente_id": "C1", "linea_producto": "Pinturas", "marca_producto": "Alfa"},
  {"nomvendedor": "Ana Gómez", "anio": 2024, "mes": 2, "valor_venta": "200,00",
   "cliente_id": "C2", "linea_producto": "Herramientas", "marca_producto": "Beta"},
  {"nomvendedor": "JOSE PEREZ", "anio": 2025, "mes": 1, "valor_venta": 150.0,
   "cliente_id": "C1", "linea_producto": "Pinturas", "marca_producto": "Alfa"},
  {"nomvendedor": "ana gomez", "anio": 2025, "mes": 3, "valor_venta": 150.0,
   "cliente_id": "C3", "linea_producto": "Herramientas", "marca_producto": "Beta"},
  {"nomvendedor": "Ana Gómez", "anio": 2025, "mes": 13, "valor_venta": 10.0}
]"#;

#[test]
fn budget_allocates_explicit_target() {
    with_env(&[], || {
        let workspace = workspace();
        let request = plan_request(&workspace, Some(400.0));

        let result = budget::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 0, "expected successful budget run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "budget");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["target"]["source"], "explicit");
        assert_eq!(payload["data"]["ingest"]["rows_rejected"], 1);

        let allocations = payload["data"]["plan"]["allocations"].as_array().expect("allocations");
        assert_eq!(allocations.len(), 2);
        let total: f64 =
            allocations.iter().map(|entry| entry["allocation"].as_f64().unwrap_or(0.0)).sum();
        assert!((total - 400.0).abs() < 1e-6);
    });
}

#[test]
fn budget_projects_target_when_none_is_given() {
    with_env(&[], || {
        let workspace = workspace();
        let mut request = plan_request(&workspace, None);
        request.scenario = Some(Scenario::Conservative);

        let result = budget::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 0, "expected successful budget run: {}", result.output);

        let payload = parse_payload(&result.output);
        let target = &payload["data"]["target"];
        assert_eq!(target["source"], "projected");
        assert_eq!(target["projection"]["scenario"], "conservative");
        // 300 -> 300 is flat history, so every scenario keeps 300.
        assert!((target["total"].as_f64().unwrap_or(0.0) - 300.0).abs() < 1e-9);
    });
}

#[test]
fn budget_rejects_equal_comparison_years() {
    with_env(&[], || {
        let workspace = workspace();
        let mut request = plan_request(&workspace, Some(400.0));
        request.year_prior = 2025;

        let result = budget::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 4, "expected domain failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "comparison_years");
    });
}

#[test]
fn budget_reports_missing_records_file() {
    with_env(&[], || {
        let request = PlanRequest {
            records: PathBuf::from("/nonexistent/ventas.json"),
            year_prior: 2024,
            year_current: 2025,
            target: Some(100.0),
            scenario: None,
        };

        let result = budget::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 3, "expected input failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "input");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("ventas.json"));
    });
}

#[test]
fn budget_returns_config_failure_for_bad_env_override() {
    with_env(&[("SALESPLAN_BUDGET_FLOOR_RATIO", "seventy")], || {
        let workspace = workspace();
        let result = budget::run(&LoadOptions::default(), &plan_request(&workspace, Some(1.0)));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "budget");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn budget_uses_groups_from_config_file() {
    with_env(&[], || {
        let workspace = workspace();
        let config_path = workspace.path().join("salesplan.toml");
        fs::write(
            &config_path,
            "[groups]\n\"ALMACEN CENTRO\" = [\"Jose Perez\", \"Ana Gomez\"]\n",
        )
        .expect("write config");
        let options = LoadOptions {
            config_path: Some(config_path),
            require_file: true,
            ..LoadOptions::default()
        };

        let result = budget::run(&options, &plan_request(&workspace, Some(400.0)));
        assert_eq!(result.exit_code, 0, "expected successful budget run: {}", result.output);

        let payload = parse_payload(&result.output);
        let groups = payload["data"]["plan"]["groups"].as_array().expect("groups");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["group"], "ALMACEN CENTRO");
    });
}

#[test]
fn monthly_returns_twelve_entries_per_salesperson() {
    with_env(&[], || {
        let workspace = workspace();
        let request = plan_request(&workspace, Some(1200.0));
        let result = monthly::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 0, "expected successful monthly run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["monthly"]["base_year"], 2024);
        let entries = payload["data"]["monthly"]["entries"].as_array().expect("entries");
        assert_eq!(entries.len(), 24);
        let month_totals = payload["data"]["month_totals"].as_array().expect("month totals");
        let total: f64 = month_totals.iter().map(|value| value.as_f64().unwrap_or(0.0)).sum();
        assert!((total - 1200.0).abs() < 1e-6);
    });
}

#[test]
fn project_returns_all_scenarios_by_default() {
    let result = project::run(&ProjectRequest {
        prior_total: 1000.0,
        current_total: 1200.0,
        scenario: None,
    });
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    let projections = payload["data"]["projections"].as_array().expect("projections");
    assert_eq!(projections.len(), 3);
    assert_eq!(projections[0]["scenario"], "conservative");
    assert!((projections[2]["projected_total"].as_f64().unwrap_or(0.0) - 1488.0).abs() < 1e-9);
    assert_eq!(payload["data"]["warnings"].as_array().map(Vec::len), Some(0));
}

#[test]
fn project_flags_degenerate_history() {
    let result = project::run(&ProjectRequest {
        prior_total: 0.0,
        current_total: 500.0,
        scenario: Some(Scenario::Optimistic),
    });

    let payload = parse_payload(&result.output);
    assert_eq!(payload["data"]["projections"][0]["projected_total"], 500.0);
    assert_eq!(payload["data"]["warnings"][0]["kind"], "degenerate_projection");
}

#[test]
fn analyze_returns_all_sections() {
    with_env(&[], || {
        let workspace = workspace();
        let request = AnalyzeRequest {
            records: records_path(&workspace),
            year_prior: 2024,
            year_current: 2025,
        };

        let result = analyze::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 0, "expected successful analyze run: {}", result.output);

        let payload = parse_payload(&result.output);
        let data = &payload["data"];
        assert_eq!(data["quadrants"].as_array().map(Vec::len), Some(2));
        assert_eq!(data["concentration"].as_array().map(Vec::len), Some(2));
        assert_eq!(data["retention"][0]["salesperson"], "ANA GOMEZ");
        assert_eq!(data["retention"][0]["lost"], 1);
        assert_eq!(data["growth_contributions"].as_array().map(Vec::len), Some(2));
        assert!(data["total_growth"].as_f64().unwrap_or(1.0).abs() < 1e-12);
    });
}

#[test]
fn report_renders_markdown_tables() {
    with_env(&[], || {
        let workspace = workspace();
        let request =
            ReportRequest { plan: plan_request(&workspace, Some(1_234_567.0)), output: None };

        let result = report::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 0, "expected rendered report: {}", result.output);

        assert!(result.output.starts_with("# Sales budget 2026"));
        assert!(result.output.contains("**1,234,567.00**"));
        assert!(result.output.contains("## Allocation by group"));
        assert!(result.output.contains("| 01 |"));
    });
}

#[test]
fn report_can_be_written_to_file() {
    with_env(&[], || {
        let workspace = workspace();
        let output = workspace.path().join("presupuesto.md");
        let request = ReportRequest {
            plan: plan_request(&workspace, Some(400.0)),
            output: Some(output.clone()),
        };

        let result = report::run(&LoadOptions::default(), &request);
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["status"], "ok");

        let written = fs::read_to_string(&output).expect("report file");
        assert!(written.contains("| 12 |"));
    });
}

#[test]
fn config_reports_source_attribution() {
    with_env(&[("SALESPLAN_BUDGET_CEILING_RATIO", "1.5")], || {
        let result = config::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0);

        assert!(result
            .output
            .contains("- budget.ceiling_ratio = 1.5 (source: env (SALESPLAN_BUDGET_CEILING_RATIO))"));
        assert!(result.output.contains("- budget.floor_ratio = 0.7 (source: default)"));
        assert!(result.output.contains("- ingest.salesperson = nomvendedor (source: default)"));
    });
}

#[test]
fn band_ratio_flags_override_config() {
    with_env(&[("SALESPLAN_BUDGET_FLOOR_RATIO", "0.6")], || {
        let cli = Cli::try_parse_from([
            "salesplan",
            "--floor-ratio",
            "0.8",
            "--ceiling-ratio",
            "1.2",
            "config",
        ])
        .expect("valid arguments");
        let options = cli.load_options();
        assert_eq!(options.overrides.floor_ratio, Some(0.8));
        assert_eq!(options.overrides.ceiling_ratio, Some(1.2));

        let result = config::run(&options);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("- budget.floor_ratio = 0.8 (source: cli)"));
        assert!(result.output.contains("- budget.ceiling_ratio = 1.2 (source: cli)"));
    });
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(records_path(&dir), RECORDS).expect("write records");
    dir
}

fn records_path(dir: &TempDir) -> PathBuf {
    dir.path().join("ventas.json")
}

fn plan_request(dir: &TempDir, target: Option<f64>) -> PlanRequest {
    PlanRequest {
        records: records_path(dir),
        year_prior: 2024,
        year_current: 2025,
        target,
        scenario: None,
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON payload")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock poisoned");

    let keys = [
        "SALESPLAN_BUDGET_FLOOR_RATIO",
        "SALESPLAN_BUDGET_CEILING_RATIO",
        "SALESPLAN_BUDGET_GROWTH_FLOOR",
        "SALESPLAN_BUDGET_GROWTH_CEILING",
        "SALESPLAN_BUDGET_DEFAULT_SCENARIO",
        "SALESPLAN_LOGGING_LEVEL",
        "SALESPLAN_LOGGING_FORMAT",
        "SALESPLAN_LOG_LEVEL",
        "SALESPLAN_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
