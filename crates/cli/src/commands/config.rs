use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use salesplan_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct FieldSources<'a> {
    overrides: &'a [&'a str],
    file_doc: Option<&'a Value>,
    file_path: Option<&'a Path>,
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error("config", &error),
    };

    let file_path = detect_config_path(options.config_path.as_deref());
    let file_doc = load_config_file_doc(file_path.as_deref());
    let overrides = cli_overrides(options);
    let sources = FieldSources {
        overrides: &overrides,
        file_doc: file_doc.as_ref(),
        file_path: file_path.as_deref(),
    };

    CommandResult::raw(render(&config, &sources))
}

fn render(config: &AppConfig, sources: &FieldSources<'_>) -> String {
    let budget = &config.budget;
    let mut lines =
        vec!["effective config (source precedence: cli > env > file > default):".to_string()];

    let numeric = [
        ("budget.floor_ratio", budget.floor_ratio, &["SALESPLAN_BUDGET_FLOOR_RATIO"][..]),
        ("budget.ceiling_ratio", budget.ceiling_ratio, &["SALESPLAN_BUDGET_CEILING_RATIO"][..]),
        ("budget.growth_floor", budget.growth_floor, &["SALESPLAN_BUDGET_GROWTH_FLOOR"][..]),
        ("budget.growth_ceiling", budget.growth_ceiling, &["SALESPLAN_BUDGET_GROWTH_CEILING"][..]),
        ("budget.product_line_weight", budget.product_line_weight, &[][..]),
        ("budget.client_weight", budget.client_weight, &[][..]),
        ("budget.diversity_boost", budget.diversity_boost, &[][..]),
    ];
    for (key, value, env_keys) in numeric {
        lines.push(render_line(key, &value.to_string(), field_source(key, env_keys, sources)));
    }

    lines.push(render_line(
        "budget.default_scenario",
        budget.default_scenario.as_str(),
        field_source("budget.default_scenario", &["SALESPLAN_BUDGET_DEFAULT_SCENARIO"], sources),
    ));

    let members: usize = config.groups.iter().map(|(_, members)| members.len()).sum();
    lines.push(render_line(
        "groups",
        &format!("{} groups, {members} members", config.groups.len()),
        field_source("groups", &[], sources),
    ));

    let ingest = &config.ingest;
    let columns = [
        ("ingest.salesperson", &ingest.salesperson),
        ("ingest.year", &ingest.year),
        ("ingest.month", &ingest.month),
        ("ingest.date", &ingest.date),
        ("ingest.amount", &ingest.amount),
        ("ingest.client", &ingest.client),
        ("ingest.product_line", &ingest.product_line),
        ("ingest.brand", &ingest.brand),
    ];
    for (key, column) in columns {
        let shown = if column.is_empty() { "<unset>" } else { column.as_str() };
        lines.push(render_line(key, shown, field_source(key, &[], sources)));
    }

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source(
            "logging.level",
            &["SALESPLAN_LOGGING_LEVEL", "SALESPLAN_LOG_LEVEL"],
            sources,
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_ascii_lowercase(),
        field_source(
            "logging.format",
            &["SALESPLAN_LOGGING_FORMAT", "SALESPLAN_LOG_FORMAT"],
            sources,
        ),
    ));

    lines.join("\n")
}

fn cli_overrides(options: &LoadOptions) -> Vec<&'static str> {
    let overrides = &options.overrides;
    let mut keys = Vec::new();
    if overrides.log_level.is_some() {
        keys.push("logging.level");
    }
    if overrides.log_format.is_some() {
        keys.push("logging.format");
    }
    if overrides.default_scenario.is_some() {
        keys.push("budget.default_scenario");
    }
    if overrides.floor_ratio.is_some() {
        keys.push("budget.floor_ratio");
    }
    if overrides.ceiling_ratio.is_some() {
        keys.push("budget.ceiling_ratio");
    }
    keys
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("salesplan.toml"), PathBuf::from("config/salesplan.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], sources: &FieldSources<'_>) -> String {
    if sources.overrides.contains(&key_path) {
        return "cli".to_string();
    }

    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = sources.file_doc {
        if contains_path(doc, key_path) {
            let file_path = sources
                .file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
