use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::budget::WeightSource;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("comparison years must differ (both were {year})")]
    SameComparisonYears { year: i32 },
    #[error("month must be in range 1..=12, got {value}")]
    InvalidMonth { value: i64 },
}

/// Degenerate-but-valid outcomes. These never abort a run; they travel with
/// the result so the caller can decide whether to surface them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetWarning {
    InsufficientData { detail: String },
    InvalidTarget { value: f64 },
    DegenerateProjection { total_prior: f64, total_current: f64 },
    MissingMonthlyHistory { salesperson: String, fallback: WeightSource },
}

impl BudgetWarning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::InvalidTarget { .. } => "invalid_target",
            Self::DegenerateProjection { .. } => "degenerate_projection",
            Self::MissingMonthlyHistory { .. } => "missing_monthly_history",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("input failure: {0}")]
    Input(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, error_class: &'static str },
    #[error("configuration error: {message}")]
    Misconfigured { message: String },
    #[error("unreadable input: {message}")]
    UnreadableInput { message: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check the comparison years and inputs."
            }
            Self::Misconfigured { .. } => {
                "The configuration is invalid. Run `salesplan config` to inspect it."
            }
            Self::UnreadableInput { .. } => {
                "The sales records could not be read. Check the file path and format."
            }
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { error_class, .. } => *error_class,
            Self::Misconfigured { .. } => "config_validation",
            Self::UnreadableInput { .. } => "input",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Misconfigured { .. } => 2,
            Self::UnreadableInput { .. } => 3,
            Self::BadRequest { .. } => 4,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => {
                let error_class = match error {
                    DomainError::SameComparisonYears { .. } => "comparison_years",
                    DomainError::InvalidMonth { .. } => "invalid_month",
                };
                Self::BadRequest { message: error.to_string(), error_class }
            }
            ApplicationError::Configuration(error) => {
                Self::Misconfigured { message: error.to_string() }
            }
            ApplicationError::Input(message) => Self::UnreadableInput { message },
        }
    }
}
