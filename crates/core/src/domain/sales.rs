use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::naming::normalize_name;

/// Normalized salesperson key. Two spellings of the same person map to the
/// same id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SalespersonId(pub String);

impl SalespersonId {
    pub fn from_name(raw: &str) -> Self {
        Self(normalize_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SalespersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Month(u8);

impl Month {
    pub const COUNT: usize = 12;

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if (1..=12).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::InvalidMonth { value })
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position, for indexing 12-slot arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12u8).map(Month)
    }
}

impl TryFrom<u8> for Month {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Month> for u8 {
    fn from(value: Month) -> Self {
        value.0
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// One sales transaction, already mapped from the source schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub salesperson: String,
    pub year: i32,
    pub month: Month,
    pub amount: f64,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub product_line: String,
    #[serde(default)]
    pub brand: String,
}

impl SalesRecord {
    pub fn new(salesperson: impl Into<String>, year: i32, month: Month, amount: f64) -> Self {
        Self {
            salesperson: salesperson.into(),
            year,
            month,
            amount: sanitize_amount(amount),
            client: String::new(),
            product_line: String::new(),
            brand: String::new(),
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_product_line(mut self, product_line: impl Into<String>) -> Self {
        self.product_line = product_line.into();
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn salesperson_id(&self) -> SalespersonId {
        SalespersonId::from_name(&self.salesperson)
    }

    /// Amount with non-finite or negative values read as zero.
    pub fn effective_amount(&self) -> f64 {
        sanitize_amount(self.amount)
    }
}

pub fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
