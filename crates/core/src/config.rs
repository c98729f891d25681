use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::groups::GroupMembership;
use crate::budget::projection::Scenario;
use crate::ingest::ColumnMapping;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub budget: BudgetSettings,
    pub groups: GroupMembership,
    pub ingest: ColumnMapping,
    pub logging: LoggingConfig,
}

/// Tuning knobs of the allocation engine. Passed by value into every stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettings {
    /// Lower clamp, as a multiple of current-year sales.
    pub floor_ratio: f64,
    /// Upper clamp, as a multiple of current-year sales.
    pub ceiling_ratio: f64,
    pub growth_floor: f64,
    pub growth_ceiling: f64,
    pub product_line_weight: f64,
    pub client_weight: f64,
    /// Score multiplier applied per unit of diversity index.
    pub diversity_boost: f64,
    pub default_scenario: Scenario,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            floor_ratio: 0.70,
            ceiling_ratio: 1.35,
            growth_floor: -0.15,
            growth_ceiling: 0.30,
            product_line_weight: 0.6,
            client_weight: 0.4,
            diversity_boost: 0.10,
            default_scenario: Scenario::Realistic,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub default_scenario: Option<Scenario>,
    pub floor_ratio: Option<f64>,
    pub ceiling_ratio: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            budget: BudgetSettings::default(),
            groups: GroupMembership::default(),
            ingest: ColumnMapping::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("salesplan.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(budget) = patch.budget {
            if let Some(floor_ratio) = budget.floor_ratio {
                self.budget.floor_ratio = floor_ratio;
            }
            if let Some(ceiling_ratio) = budget.ceiling_ratio {
                self.budget.ceiling_ratio = ceiling_ratio;
            }
            if let Some(growth_floor) = budget.growth_floor {
                self.budget.growth_floor = growth_floor;
            }
            if let Some(growth_ceiling) = budget.growth_ceiling {
                self.budget.growth_ceiling = growth_ceiling;
            }
            if let Some(product_line_weight) = budget.product_line_weight {
                self.budget.product_line_weight = product_line_weight;
            }
            if let Some(client_weight) = budget.client_weight {
                self.budget.client_weight = client_weight;
            }
            if let Some(diversity_boost) = budget.diversity_boost {
                self.budget.diversity_boost = diversity_boost;
            }
            if let Some(default_scenario) = budget.default_scenario {
                self.budget.default_scenario = default_scenario;
            }
        }

        if let Some(groups) = patch.groups {
            self.groups = GroupMembership::new(groups);
        }

        if let Some(ingest) = patch.ingest {
            if let Some(salesperson) = ingest.salesperson {
                self.ingest.salesperson = salesperson;
            }
            if let Some(year) = ingest.year {
                self.ingest.year = year;
            }
            if let Some(month) = ingest.month {
                self.ingest.month = month;
            }
            if let Some(date) = ingest.date {
                self.ingest.date = date;
            }
            if let Some(amount) = ingest.amount {
                self.ingest.amount = amount;
            }
            if let Some(client) = ingest.client {
                self.ingest.client = client;
            }
            if let Some(product_line) = ingest.product_line {
                self.ingest.product_line = product_line;
            }
            if let Some(brand) = ingest.brand {
                self.ingest.brand = brand;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SALESPLAN_BUDGET_FLOOR_RATIO") {
            self.budget.floor_ratio = parse_f64("SALESPLAN_BUDGET_FLOOR_RATIO", &value)?;
        }
        if let Some(value) = read_env("SALESPLAN_BUDGET_CEILING_RATIO") {
            self.budget.ceiling_ratio = parse_f64("SALESPLAN_BUDGET_CEILING_RATIO", &value)?;
        }
        if let Some(value) = read_env("SALESPLAN_BUDGET_GROWTH_FLOOR") {
            self.budget.growth_floor = parse_f64("SALESPLAN_BUDGET_GROWTH_FLOOR", &value)?;
        }
        if let Some(value) = read_env("SALESPLAN_BUDGET_GROWTH_CEILING") {
            self.budget.growth_ceiling = parse_f64("SALESPLAN_BUDGET_GROWTH_CEILING", &value)?;
        }
        if let Some(value) = read_env("SALESPLAN_BUDGET_DEFAULT_SCENARIO") {
            self.budget.default_scenario =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "SALESPLAN_BUDGET_DEFAULT_SCENARIO".to_string(),
                    value: value.clone(),
                })?;
        }

        let log_level =
            read_env("SALESPLAN_LOGGING_LEVEL").or_else(|| read_env("SALESPLAN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SALESPLAN_LOGGING_FORMAT").or_else(|| read_env("SALESPLAN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(default_scenario) = overrides.default_scenario {
            self.budget.default_scenario = default_scenario;
        }
        if let Some(floor_ratio) = overrides.floor_ratio {
            self.budget.floor_ratio = floor_ratio;
        }
        if let Some(ceiling_ratio) = overrides.ceiling_ratio {
            self.budget.ceiling_ratio = ceiling_ratio;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_budget(&self.budget)?;
        validate_groups(&self.groups)?;
        validate_ingest(&self.ingest)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("salesplan.toml"), PathBuf::from("config/salesplan.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_budget(budget: &BudgetSettings) -> Result<(), ConfigError> {
    let values = [
        ("budget.floor_ratio", budget.floor_ratio),
        ("budget.ceiling_ratio", budget.ceiling_ratio),
        ("budget.growth_floor", budget.growth_floor),
        ("budget.growth_ceiling", budget.growth_ceiling),
        ("budget.product_line_weight", budget.product_line_weight),
        ("budget.client_weight", budget.client_weight),
        ("budget.diversity_boost", budget.diversity_boost),
    ];
    if let Some((key, _)) = values.iter().find(|(_, value)| !value.is_finite()) {
        return Err(ConfigError::Validation(format!("{key} must be a finite number")));
    }

    if budget.floor_ratio < 0.0 || budget.floor_ratio > budget.ceiling_ratio {
        return Err(ConfigError::Validation(
            "budget.floor_ratio must be non-negative and not above budget.ceiling_ratio"
                .to_string(),
        ));
    }

    if budget.growth_floor > budget.growth_ceiling {
        return Err(ConfigError::Validation(
            "budget.growth_floor must not exceed budget.growth_ceiling".to_string(),
        ));
    }

    if budget.product_line_weight < 0.0 || budget.client_weight < 0.0 {
        return Err(ConfigError::Validation(
            "budget.product_line_weight and budget.client_weight must be non-negative".to_string(),
        ));
    }

    let weight_sum = budget.product_line_weight + budget.client_weight;
    if (weight_sum - 1.0).abs() > 1e-9 {
        return Err(ConfigError::Validation(format!(
            "budget.product_line_weight + budget.client_weight must equal 1.0 (got {weight_sum})"
        )));
    }

    if budget.diversity_boost < 0.0 {
        return Err(ConfigError::Validation(
            "budget.diversity_boost must be non-negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_groups(groups: &GroupMembership) -> Result<(), ConfigError> {
    for (group, members) in groups.iter() {
        if group.trim().is_empty() {
            return Err(ConfigError::Validation("groups must not use an empty name".to_string()));
        }
        if members.iter().any(|member| member.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "groups.{group} contains an empty member name"
            )));
        }
    }

    Ok(())
}

fn validate_ingest(ingest: &ColumnMapping) -> Result<(), ConfigError> {
    if ingest.salesperson.trim().is_empty() || ingest.amount.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ingest.salesperson and ingest.amount column names are required".to_string(),
        ));
    }

    let has_period_columns = !ingest.year.trim().is_empty() && !ingest.month.trim().is_empty();
    if !has_period_columns && ingest.date.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ingest needs either both ingest.year and ingest.month or an ingest.date column"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    budget: Option<BudgetPatch>,
    groups: Option<BTreeMap<String, Vec<String>>>,
    ingest: Option<IngestPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BudgetPatch {
    floor_ratio: Option<f64>,
    ceiling_ratio: Option<f64>,
    growth_floor: Option<f64>,
    growth_ceiling: Option<f64>,
    product_line_weight: Option<f64>,
    client_weight: Option<f64>,
    diversity_boost: Option<f64>,
    default_scenario: Option<Scenario>,
}

#[derive(Debug, Default, Deserialize)]
struct IngestPatch {
    salesperson: Option<String>,
    year: Option<String>,
    month: Option<String>,
    date: Option<String>,
    amount: Option<String>,
    client: Option<String>,
    product_line: Option<String>,
    brand: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::budget::projection::Scenario;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_reference_budget_parameters() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.budget.floor_ratio == 0.70, "floor ratio defaults to 0.70")?;
        ensure(config.budget.ceiling_ratio == 1.35, "ceiling ratio defaults to 1.35")?;
        ensure(config.budget.growth_floor == -0.15, "growth floor defaults to -0.15")?;
        ensure(config.budget.growth_ceiling == 0.30, "growth ceiling defaults to 0.30")?;
        ensure(config.budget.product_line_weight == 0.6, "product-line weight defaults to 0.6")?;
        ensure(config.budget.client_weight == 0.4, "client weight defaults to 0.4")?;
        ensure(config.groups.is_empty(), "no groups are configured by default")?;
        ensure(config.ingest.salesperson == "nomvendedor", "salesperson column default")?;
        Ok(())
    }

    #[test]
    fn file_load_reads_groups_and_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SALESPLAN_AMOUNT_COLUMN", "valor_neto");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("salesplan.toml");
            fs::write(
                &path,
                r#"
[budget]
floor_ratio = 0.8
default_scenario = "optimista"

[groups]
"ALMACEN CENTRO" = ["José Pérez", "Ana Gómez"]

[ingest]
amount = "${TEST_SALESPLAN_AMOUNT_COLUMN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.budget.floor_ratio == 0.8, "floor ratio should come from file")?;
            ensure(
                config.budget.default_scenario == Scenario::Optimistic,
                "spanish scenario alias should parse",
            )?;
            ensure(config.ingest.amount == "valor_neto", "amount column should be interpolated")?;
            ensure(
                config.groups.group_of("JOSE PEREZ") == Some("ALMACEN CENTRO"),
                "group membership should match normalized names",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_SALESPLAN_AMOUNT_COLUMN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SALESPLAN_LOG_LEVEL", "warn");
        env::set_var("SALESPLAN_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["SALESPLAN_LOG_LEVEL", "SALESPLAN_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SALESPLAN_BUDGET_CEILING_RATIO", "1.5");
        env::set_var("SALESPLAN_BUDGET_GROWTH_CEILING", "0.25");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("salesplan.toml");
            fs::write(
                &path,
                r#"
[budget]
ceiling_ratio = 1.2
growth_ceiling = 0.4
floor_ratio = 0.6

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    floor_ratio: Some(0.75),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.budget.floor_ratio == 0.75, "override floor ratio should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.budget.ceiling_ratio == 1.5, "env ceiling should win over file")?;
            ensure(config.budget.growth_ceiling == 0.25, "env growth ceiling should win")?;
            Ok(())
        })();

        clear_vars(&["SALESPLAN_BUDGET_CEILING_RATIO", "SALESPLAN_BUDGET_GROWTH_CEILING"]);
        result
    }

    #[test]
    fn validation_rejects_weights_that_do_not_sum_to_one() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("salesplan.toml");
        fs::write(
            &path,
            r#"
[budget]
product_line_weight = 0.7
client_weight = 0.4
"#,
        )
        .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("client_weight")
        );
        ensure(has_message, "validation failure should mention the weights")
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SALESPLAN_BUDGET_FLOOR_RATIO", "seventy");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected env override failure".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "SALESPLAN_BUDGET_FLOOR_RATIO", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["SALESPLAN_BUDGET_FLOOR_RATIO"]);
        result
    }

    #[test]
    fn missing_required_file_fails() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("nowhere/salesplan.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }
}
