//! Boundary mapping from raw sales exports to typed [`SalesRecord`]s.
//!
//! Raw rows are JSON objects keyed by whatever column names the export
//! uses. The mapping is explicit and configured once; nothing downstream
//! looks at column names.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::sales::{Month, SalesRecord};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Source column names for each record field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub salesperson: String,
    pub year: String,
    pub month: String,
    pub date: String,
    pub amount: String,
    pub client: String,
    pub product_line: String,
    pub brand: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            salesperson: "nomvendedor".to_string(),
            year: "anio".to_string(),
            month: "mes".to_string(),
            date: "fecha_venta".to_string(),
            amount: "valor_venta".to_string(),
            client: "cliente_id".to_string(),
            product_line: "linea_producto".to_string(),
            brand: "marca_producto".to_string(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("input is not a JSON array of rows: {0}")]
    Malformed(String),
    #[error("row {row}: expected a JSON object")]
    NotAnObject { row: usize },
    #[error("row {row}: missing column `{column}`")]
    MissingColumn { row: usize, column: String },
    #[error("row {row}: invalid {field} value `{value}`")]
    InvalidField { row: usize, field: &'static str, value: String },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub records: Vec<SalesRecord>,
    pub rows_read: usize,
    pub rows_rejected: usize,
    /// Rows kept with their amount read as zero (missing, negative, unparseable).
    pub amounts_coerced: usize,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<IngestError>,
}

impl IngestReport {
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|record| record.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}

#[allow(clippy::ptr_arg)]
fn serialize_errors<S>(errors: &Vec<IngestError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

pub fn ingest_json(raw: &str, mapping: &ColumnMapping) -> Result<IngestReport, IngestError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|error| IngestError::Malformed(error.to_string()))?;
    let Value::Array(rows) = value else {
        return Err(IngestError::Malformed("top-level value must be an array".to_string()));
    };
    Ok(ingest_rows(&rows, mapping))
}

pub fn ingest_rows(rows: &[Value], mapping: &ColumnMapping) -> IngestReport {
    let mut report = IngestReport { rows_read: rows.len(), ..IngestReport::default() };

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let Value::Object(fields) = row else {
            report.errors.push(IngestError::NotAnObject { row: row_number });
            continue;
        };

        match map_row(row_number, fields, mapping) {
            Ok((record, coerced)) => {
                if coerced {
                    report.amounts_coerced += 1;
                }
                report.records.push(record);
            }
            Err(error) => report.errors.push(error),
        }
    }

    report.rows_rejected = report.errors.len();
    if report.rows_rejected > 0 {
        warn!(
            event_name = "ingest.rows_rejected",
            rows_rejected = report.rows_rejected,
            first_error = %report.errors[0],
            "some sales rows could not be mapped"
        );
    }
    info!(
        event_name = "ingest.completed",
        rows_read = report.rows_read,
        records = report.records.len(),
        rows_rejected = report.rows_rejected,
        amounts_coerced = report.amounts_coerced,
        "sales rows mapped to records"
    );

    report
}

fn map_row(
    row: usize,
    fields: &Map<String, Value>,
    mapping: &ColumnMapping,
) -> Result<(SalesRecord, bool), IngestError> {
    let salesperson = fields
        .get(&mapping.salesperson)
        .ok_or_else(|| IngestError::MissingColumn { row, column: mapping.salesperson.clone() })
        .map(text_value)?;
    if salesperson.is_empty() {
        return Err(IngestError::InvalidField { row, field: "salesperson", value: salesperson });
    }

    let (year, month) = period(row, fields, mapping)?;

    let (amount, coerced) = match fields.get(&mapping.amount).and_then(parse_amount) {
        Some(amount) => (amount, false),
        None => (0.0, true),
    };

    let record = SalesRecord::new(salesperson, year, month, amount)
        .with_client(optional_text(fields, &mapping.client))
        .with_product_line(optional_text(fields, &mapping.product_line))
        .with_brand(optional_text(fields, &mapping.brand));

    Ok((record, coerced))
}

fn period(
    row: usize,
    fields: &Map<String, Value>,
    mapping: &ColumnMapping,
) -> Result<(i32, Month), IngestError> {
    let year_value = non_null(fields, &mapping.year);
    let month_value = non_null(fields, &mapping.month);

    if let (Some(year_value), Some(month_value)) = (year_value, month_value) {
        let year = integer_value(year_value)
            .and_then(|year| i32::try_from(year).ok())
            .ok_or_else(|| invalid(row, "year", year_value))?;
        let month = integer_value(month_value)
            .and_then(|month| Month::new(month).ok())
            .ok_or_else(|| invalid(row, "month", month_value))?;
        return Ok((year, month));
    }

    let Some(date_value) = non_null(fields, &mapping.date) else {
        let column = if year_value.is_none() { &mapping.year } else { &mapping.month };
        let column = if column.is_empty() { &mapping.date } else { column };
        return Err(IngestError::MissingColumn { row, column: column.clone() });
    };

    let date = date_value
        .as_str()
        .and_then(parse_date)
        .ok_or_else(|| invalid(row, "date", date_value))?;
    let month =
        Month::new(i64::from(date.month())).map_err(|_| invalid(row, "date", date_value))?;
    Ok((date.year(), month))
}

/// Parses the supported date layouts; time of day is ignored.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// Reads a sale amount. `None` means the value must be coerced to zero.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => parse_amount_text(text)?.to_f64()?,
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

/// Parses money text such as `$ 1.234.567,89`, `1,234,567.89`, `$ 45.000` or `-45`.
///
/// When both separators appear the last one is the decimal mark. A lone
/// separator of either kind followed by exactly three digits groups
/// thousands, unless the integer part is zero (`0.125`). Repeated identical
/// separators group thousands.
pub fn parse_amount_text(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|ch| ch.is_ascii_digit() || matches!(ch, '.' | ',' | '-'))
        .collect();
    if !cleaned.chars().any(|ch| ch.is_ascii_digit()) {
        return None;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let canonical = match (dots, commas) {
        (0, 0) => cleaned,
        (1, 0) => lone_separator(&cleaned, '.'),
        (0, 1) => lone_separator(&cleaned, ','),
        (_, 0) => cleaned.replace('.', ""),
        (0, _) => cleaned.replace(',', ""),
        _ => {
            let last_dot = cleaned.rfind('.').unwrap_or_default();
            let last_comma = cleaned.rfind(',').unwrap_or_default();
            if last_comma > last_dot {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
    };

    Decimal::from_str(&canonical).ok()
}

fn lone_separator(text: &str, separator: char) -> String {
    let (integer, fraction) = text.split_once(separator).unwrap_or((text, ""));
    let integer_digits = integer.trim_start_matches('-');
    let groups_thousands =
        fraction.len() == 3 && !integer_digits.is_empty() && integer_digits != "0";
    if groups_thousands {
        format!("{integer}{fraction}")
    } else {
        format!("{integer}.{fraction}")
    }
}

fn non_null<'a>(fields: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    if column.is_empty() {
        return None;
    }
    fields.get(column).filter(|value| match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    })
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number.as_f64().filter(|float| float.fract() == 0.0).map(|float| float as i64)
        }),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|float| float.is_finite() && float.fract() == 0.0)
                    .map(|float| float as i64)
            })
        }
        _ => None,
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn optional_text(fields: &Map<String, Value>, column: &str) -> String {
    if column.is_empty() {
        return String::new();
    }
    fields.get(column).map(text_value).unwrap_or_default()
}

fn invalid(row: usize, field: &'static str, value: &Value) -> IngestError {
    IngestError::InvalidField { row, field, value: text_value(value) }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{
        ingest_json, ingest_rows, parse_amount, parse_amount_text, parse_date, ColumnMapping,
        IngestError,
    };

    fn decimal(text: &str) -> Option<Decimal> {
        text.parse::<Decimal>().ok()
    }

    #[test]
    fn amount_text_handles_both_grouping_styles() {
        assert_eq!(parse_amount_text("$ 1.234.567,89"), decimal("1234567.89"));
        assert_eq!(parse_amount_text("1,234,567.89"), decimal("1234567.89"));
        assert_eq!(parse_amount_text("1,234"), decimal("1234"));
        assert_eq!(parse_amount_text("12,5"), decimal("12.5"));
        assert_eq!(parse_amount_text("12.5"), decimal("12.5"));
        assert_eq!(parse_amount_text("1.000.000"), decimal("1000000"));
        assert_eq!(parse_amount_text("n/a"), None);
    }

    #[test]
    fn lone_separator_before_three_digits_groups_thousands() {
        assert_eq!(parse_amount_text("$ 45.000"), decimal("45000"));
        assert_eq!(parse_amount_text("45.000"), decimal("45000"));
        assert_eq!(parse_amount_text("1.500"), decimal("1500"));
        assert_eq!(parse_amount_text("45,000"), decimal("45000"));
        assert_eq!(parse_amount_text("2.50"), decimal("2.5"));
        assert_eq!(parse_amount_text("0.125"), decimal("0.125"));
        assert_eq!(parse_amount(&json!("$ 45.000")), Some(45000.0));
    }

    #[test]
    fn negative_and_invalid_amounts_are_rejected_for_coercion() {
        assert_eq!(parse_amount(&json!(-5)), None);
        assert_eq!(parse_amount(&json!("-1.200,00")), None);
        assert_eq!(parse_amount(&json!(null)), None);
        assert_eq!(parse_amount(&json!("abc")), None);
        assert_eq!(parse_amount(&json!(250.5)), Some(250.5));
        assert_eq!(parse_amount(&json!("250,50")), Some(250.5));
    }

    #[test]
    fn dates_parse_in_supported_layouts() {
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("15/03/2024"), expected);
        assert_eq!(parse_date("2024-03-15 10:22:00"), expected);
        assert_eq!(parse_date("2024-03-15T10:22:00"), expected);
        assert_eq!(parse_date("March 15"), None);
    }

    #[test]
    fn rows_map_through_configured_columns() {
        let rows = vec![
            json!({
                "nomvendedor": " José Pérez ",
                "anio": 2024,
                "mes": "3",
                "valor_venta": "1.500,00",
                "cliente_id": 9001,
                "linea_producto": "Pinturas",
                "marca_producto": "Marca X"
            }),
            json!({
                "nomvendedor": "Ana",
                "fecha_venta": "2025-11-02",
                "valor_venta": -20
            }),
        ];

        let report = ingest_rows(&rows, &ColumnMapping::default());

        assert_eq!(report.rows_read, 2);
        assert_eq!(report.rows_rejected, 0);
        assert_eq!(report.amounts_coerced, 1);
        assert_eq!(report.records[0].salesperson, "José Pérez");
        assert_eq!(report.records[0].year, 2024);
        assert_eq!(report.records[0].month.number(), 3);
        assert_eq!(report.records[0].amount, 1500.0);
        assert_eq!(report.records[0].client, "9001");
        assert_eq!(report.records[1].year, 2025);
        assert_eq!(report.records[1].month.number(), 11);
        assert_eq!(report.records[1].amount, 0.0);
        assert_eq!(report.records[1].client, "");
        assert_eq!(report.years(), vec![2024, 2025]);
    }

    #[test]
    fn unusable_rows_are_reported_not_fatal() {
        let rows = vec![
            json!({ "anio": 2024, "mes": 1, "valor_venta": 10 }),
            json!({ "nomvendedor": "Ana", "anio": 2024, "mes": 13, "valor_venta": 10 }),
            json!({ "nomvendedor": "Ana", "valor_venta": 10 }),
            json!("not a row"),
            json!({ "nomvendedor": "Ana", "anio": 2024, "mes": 2, "valor_venta": 10 }),
        ];

        let report = ingest_rows(&rows, &ColumnMapping::default());

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.rows_rejected, 4);
        assert!(matches!(report.errors[0], IngestError::MissingColumn { row: 1, .. }));
        assert!(matches!(
            report.errors[1],
            IngestError::InvalidField { row: 2, field: "month", .. }
        ));
        assert!(matches!(report.errors[2], IngestError::MissingColumn { row: 3, .. }));
        assert_eq!(report.errors[3], IngestError::NotAnObject { row: 4 });
    }

    #[test]
    fn custom_mapping_renames_columns() {
        let mapping = ColumnMapping {
            salesperson: "seller".to_string(),
            amount: "total".to_string(),
            date: "when".to_string(),
            year: String::new(),
            month: String::new(),
            ..ColumnMapping::default()
        };

        let raw = r#"[{"seller": "Eva", "total": 99, "when": "01/12/2023"}]"#;
        let report = ingest_json(raw, &mapping).expect("valid json");

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].year, 2023);
        assert_eq!(report.records[0].month.number(), 12);
    }

    #[test]
    fn non_array_input_is_malformed() {
        let error = ingest_json(r#"{"rows": []}"#, &ColumnMapping::default());
        assert!(matches!(error, Err(IngestError::Malformed(_))));
    }
}
