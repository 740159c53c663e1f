//! Claim records and batch ingestion.
//!
//! A batch is read from a JSON array of objects or from JSON Lines. Known
//! columns are parsed into typed fields; the original object is kept so
//! every input column can be re-emitted verbatim next to the votes.

use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use cs_common::{ClaimId, Error, Result};
use serde_json::{Map, Value};

/// Column names with a typed meaning.
pub mod columns {
    pub const CLAIM_ID: &str = "claim_id";
    pub const PROCEDURE_NAME: &str = "procedure_name";
    pub const DEPARTMENT: &str = "department";
    pub const INSURANCE_PROVIDER: &str = "insurance_provider";
    pub const PROVIDER_ID: &str = "provider_id";
    pub const ADMISSION_TYPE: &str = "admission_type";
    pub const PATIENT_GENDER: &str = "patient_gender";
    pub const SERVICE_DATE: &str = "service_date";
    pub const TOTAL_BILLED_AMOUNT: &str = "total_billed_amount";
    pub const INSURANCE_PAID_AMOUNT: &str = "insurance_paid_amount";
    pub const PATIENT_AGE: &str = "patient_age";
    pub const LENGTH_OF_STAY: &str = "length_of_stay";
    pub const PAYMENT_RATE: &str = "payment_rate";

    /// Categorical columns every non-empty batch must carry.
    pub const DIMENSIONS: [&str; 5] = [
        PROCEDURE_NAME,
        DEPARTMENT,
        INSURANCE_PROVIDER,
        PROVIDER_ID,
        SERVICE_DATE,
    ];
}

/// One billing record.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub claim_id: ClaimId,
    pub procedure_name: Option<String>,
    pub department: Option<String>,
    pub insurance_provider: Option<String>,
    pub provider_id: Option<String>,
    pub admission_type: Option<String>,
    pub patient_gender: Option<String>,
    pub service_date: Option<NaiveDate>,
    pub total_billed_amount: Option<f64>,
    pub insurance_paid_amount: Option<f64>,
    pub patient_age: Option<f64>,
    pub length_of_stay: Option<f64>,
    pub payment_rate: Option<f64>,
    /// The input object as read, every column included.
    pub raw: Map<String, Value>,
}

impl Claim {
    /// Parse one input object. `row` is the zero-based position for messages.
    pub fn from_object(raw: Map<String, Value>, row: usize) -> Result<Self> {
        let claim_id = raw
            .get(columns::CLAIM_ID)
            .and_then(ClaimId::from_json)
            .ok_or_else(|| {
                Error::InvalidInput(format!("row {}: missing or invalid claim_id", row))
            })?;

        Ok(Claim {
            procedure_name: text(&raw, columns::PROCEDURE_NAME),
            department: text(&raw, columns::DEPARTMENT),
            insurance_provider: text(&raw, columns::INSURANCE_PROVIDER),
            provider_id: text(&raw, columns::PROVIDER_ID),
            admission_type: text(&raw, columns::ADMISSION_TYPE),
            patient_gender: text(&raw, columns::PATIENT_GENDER),
            service_date: date(&raw, columns::SERVICE_DATE, row)?,
            total_billed_amount: number(&raw, columns::TOTAL_BILLED_AMOUNT, row)?,
            insurance_paid_amount: number(&raw, columns::INSURANCE_PAID_AMOUNT, row)?,
            patient_age: number(&raw, columns::PATIENT_AGE, row)?,
            length_of_stay: number(&raw, columns::LENGTH_OF_STAY, row)?,
            payment_rate: number(&raw, columns::PAYMENT_RATE, row)?,
            claim_id,
            raw,
        })
    }
}

fn text(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric cell: numbers and numeric strings are accepted; null, empty
/// strings and non-finite values count as missing.
fn number(raw: &Map<String, Value>, key: &str, row: usize) -> Result<Option<f64>> {
    let value = match raw.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().map_err(|_| {
            Error::InvalidInput(format!("row {}: {} is not numeric: {:?}", row, key, s))
        })?),
        Some(other) => {
            return Err(Error::InvalidInput(format!(
                "row {}: {} must be a number, got {}",
                row, key, other
            )))
        }
    };
    Ok(value.filter(|v| v.is_finite()))
}

/// Service dates are `YYYY-MM-DD`; longer timestamps are cut to their date.
fn date(raw: &Map<String, Value>, key: &str, row: usize) -> Result<Option<NaiveDate>> {
    let s = match raw.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
        _ => return Ok(None),
    };
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| Error::InvalidInput(format!("row {}: invalid {} {:?}", row, key, s)))
}

/// An immutable batch of claims with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimBatch {
    claims: Vec<Claim>,
    columns: BTreeSet<String>,
}

impl ClaimBatch {
    /// Build a batch from parsed JSON objects.
    pub fn from_values(rows: Vec<Value>) -> Result<Self> {
        let mut claims = Vec::with_capacity(rows.len());
        let mut columns = BTreeSet::new();
        let mut seen = HashSet::with_capacity(rows.len());

        for (row, value) in rows.into_iter().enumerate() {
            let object = match value {
                Value::Object(map) => map,
                other => {
                    return Err(Error::InvalidInput(format!(
                        "row {}: expected a JSON object, got {}",
                        row,
                        type_name(&other)
                    )))
                }
            };
            columns.extend(object.keys().cloned());
            let claim = Claim::from_object(object, row)?;
            if !seen.insert(claim.claim_id.clone()) {
                return Err(Error::DuplicateClaimId {
                    claim_id: claim.claim_id.to_string(),
                });
            }
            claims.push(claim);
        }

        Ok(ClaimBatch { claims, columns })
    }

    /// Parse a JSON array of objects or JSON Lines.
    ///
    /// Input whose first non-blank character is `[` is read as an array;
    /// anything else as one object per non-blank line.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let trimmed = input.trim_start();
        if trimmed.is_empty() {
            return Ok(ClaimBatch::default());
        }
        if trimmed.starts_with('[') {
            let rows: Vec<Value> = serde_json::from_str(trimmed)
                .map_err(|e| Error::InvalidInput(format!("malformed JSON array: {}", e)))?;
            return ClaimBatch::from_values(rows);
        }

        let mut rows = Vec::new();
        for (line_no, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|e| {
                Error::InvalidInput(format!("line {}: malformed JSON: {}", line_no + 1, e))
            })?;
            rows.push(value);
        }
        ClaimBatch::from_values(rows)
    }

    /// Read from a reader (e.g. stdin).
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut input = String::new();
        reader.read_to_string(&mut input)?;
        ClaimBatch::from_json_str(&input)
    }

    /// Read from a file, or stdin when `path` is `-`.
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.as_os_str() == "-" {
            return ClaimBatch::from_reader(std::io::stdin().lock());
        }
        let input = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        ClaimBatch::from_json_str(&input)
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn ids(&self) -> Vec<ClaimId> {
        self.claims.iter().map(|c| c.claim_id.clone()).collect()
    }

    /// Whether any row carries `column` (even as null).
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Union of the columns seen across all rows.
    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_typed_fields_and_keeps_raw() {
        let batch = ClaimBatch::from_values(vec![json!({
            "claim_id": "CLM1",
            "procedure_name": "MRI Scan",
            "service_date": "2024-03-15T10:00:00",
            "total_billed_amount": 2500.5,
            "patient_age": "44",
            "length_of_stay": 1,
            "claim_status": "Paid"
        })])
        .unwrap();
        let claim = &batch.claims()[0];
        assert_eq!(claim.claim_id.as_str(), "CLM1");
        assert_eq!(claim.procedure_name.as_deref(), Some("MRI Scan"));
        assert_eq!(claim.service_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(claim.total_billed_amount, Some(2500.5));
        assert_eq!(claim.patient_age, Some(44.0));
        assert_eq!(claim.raw.get("claim_status"), Some(&json!("Paid")));
        assert!(batch.has_column("claim_status"));
        assert!(!batch.has_column("payment_rate"));
    }

    #[test]
    fn null_and_empty_numbers_are_missing() {
        let batch = ClaimBatch::from_values(vec![
            json!({"claim_id": 1, "patient_age": null, "length_of_stay": ""}),
        ])
        .unwrap();
        let claim = &batch.claims()[0];
        assert_eq!(claim.patient_age, None);
        assert_eq!(claim.length_of_stay, None);
        assert!(batch.has_column("patient_age"));
    }

    #[test]
    fn non_numeric_string_is_invalid_input() {
        let err = ClaimBatch::from_values(vec![
            json!({"claim_id": "A", "total_billed_amount": "lots"}),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn duplicate_ids_are_fatal() {
        let err = ClaimBatch::from_values(vec![
            json!({"claim_id": "A"}),
            json!({"claim_id": "A"}),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateClaimId { ref claim_id } if claim_id == "A"));
    }

    #[test]
    fn numeric_and_string_ids_collide() {
        let err = ClaimBatch::from_values(vec![json!({"claim_id": 7}), json!({"claim_id": "7"})])
            .unwrap_err();
        assert_eq!(err.code(), 22);
    }

    #[test]
    fn missing_claim_id_is_invalid_input() {
        let err = ClaimBatch::from_values(vec![json!({"total_billed_amount": 1.0})]).unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn json_lines_and_array_agree() {
        let a = r#"{"claim_id":"a","total_billed_amount":1}"#;
        let b = r#"{"claim_id":"b","total_billed_amount":2}"#;
        let array = format!("[{},{}]", a, b);
        let lines = format!("{}\n\n{}\n", a, b);
        assert_eq!(
            ClaimBatch::from_json_str(&array).unwrap(),
            ClaimBatch::from_json_str(&lines).unwrap()
        );
    }

    #[test]
    fn empty_input_is_empty_batch() {
        assert!(ClaimBatch::from_json_str("").unwrap().is_empty());
        assert!(ClaimBatch::from_json_str("[]").unwrap().is_empty());
        assert!(ClaimBatch::from_json_str("  \n").unwrap().is_empty());
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = ClaimBatch::from_json_str("{\"claim_id\":\"a\"}\n{oops}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn non_object_row_rejected() {
        let err = ClaimBatch::from_json_str("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("expected a JSON object"));
    }
}
