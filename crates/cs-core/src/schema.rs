//! JSON Schema generation for machine-readable output types.
//!
//! Consumers of `cs-core detect --format json` can validate or generate
//! bindings from these schemas.
//!
//! ```bash
//! cs-core schema --list
//! cs-core schema DetectionReport
//! cs-core schema --all
//! ```

use schemars::schema_for;
use serde_json::Value;
use std::collections::BTreeMap;

pub use crate::consensus::DetectionResult;
pub use crate::engine::{RunMetadata, SkipReason, SkippedMethod};
pub use crate::features::{Imputation, ScalerParams};
pub use crate::output::DetectionReport;
pub use crate::summary::{GroupBy, SortKey, SummaryRow, SummaryTable};
pub use cs_common::{ClaimId, DetectionMethod, MethodKind, RunId};
pub use cs_config::{ConfigSnapshot, DetectionConfig};

/// Available schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        // Identity
        ("ClaimId", "Claim identifier"),
        ("RunId", "Detection run identifier"),
        // Methods
        ("DetectionMethod", "One outlier-detection method of the ensemble"),
        ("MethodKind", "Statistical or model-based"),
        // Results
        ("DetectionResult", "Votes, flag and risk score of one claim"),
        ("RunMetadata", "Provenance and method outcomes of one run"),
        ("SkippedMethod", "A configured method that did not vote"),
        ("SkipReason", "Why a method did not vote"),
        ("ScalerParams", "Per-feature mean and std used for standardization"),
        ("Imputation", "Median imputation applied to one feature column"),
        // Summaries
        ("GroupBy", "Summary grouping dimension"),
        ("SortKey", "Ranking of summary groups"),
        ("SummaryRow", "Aggregate statistics of one group"),
        ("SummaryTable", "Summary rows of one dimension"),
        // Configuration
        ("DetectionConfig", "Detection thresholds and methods"),
        ("ConfigSnapshot", "Configuration provenance with content hashes"),
        // Document
        (
            "DetectionReport",
            "Complete detect output: metadata, config, claims and summaries",
        ),
    ]
}

/// Generate JSON Schema for a type by name.
///
/// Returns None if the type is unknown.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "ClaimId" => schema_for!(ClaimId),
        "RunId" => schema_for!(RunId),
        "DetectionMethod" => schema_for!(DetectionMethod),
        "MethodKind" => schema_for!(MethodKind),
        "DetectionResult" => schema_for!(DetectionResult),
        "RunMetadata" => schema_for!(RunMetadata),
        "SkippedMethod" => schema_for!(SkippedMethod),
        "SkipReason" => schema_for!(SkipReason),
        "ScalerParams" => schema_for!(ScalerParams),
        "Imputation" => schema_for!(Imputation),
        "GroupBy" => schema_for!(GroupBy),
        "SortKey" => schema_for!(SortKey),
        "SummaryRow" => schema_for!(SummaryRow),
        "SummaryTable" => schema_for!(SummaryTable),
        "DetectionConfig" => schema_for!(DetectionConfig),
        "ConfigSnapshot" => schema_for!(ConfigSnapshot),
        "DetectionReport" => schema_for!(DetectionReport),
        _ => return None,
    };

    serde_json::to_value(schema).ok()
}

/// Generate all schemas as a map from type name to schema.
pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    let mut schemas = BTreeMap::new();
    for (name, _desc) in available_schemas() {
        if let Some(schema) = generate_schema(name) {
            schemas.insert(name.to_string(), schema);
        }
    }
    schemas
}

/// Schema output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

pub fn format_schema(schema: &Value, format: SchemaFormat) -> String {
    let rendered = match format {
        SchemaFormat::Json => serde_json::to_string_pretty(schema),
        SchemaFormat::JsonCompact => serde_json::to_string(schema),
    };
    rendered.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_schemas_generate() {
        for (name, _desc) in available_schemas() {
            let schema = generate_schema(name);
            assert!(schema.is_some(), "Schema for '{}' should generate", name);
        }
    }

    #[test]
    fn test_unknown_schema_returns_none() {
        assert!(generate_schema("UnknownType").is_none());
        assert!(generate_schema("").is_none());
    }

    #[test]
    fn test_report_schema_lists_fields() {
        let schema = generate_schema("DetectionReport").unwrap();
        let props = schema["properties"].as_object().unwrap();
        for field in ["schema_version", "metadata", "config", "claims"] {
            assert!(props.contains_key(field), "missing {}", field);
        }
    }

    #[test]
    fn test_generate_all_schemas() {
        let all = generate_all_schemas();
        assert_eq!(all.len(), available_schemas().len());
        assert!(all.contains_key("SummaryRow"));
    }

    #[test]
    fn test_format_schema() {
        let schema = generate_schema("SkipReason").unwrap();
        let pretty = format_schema(&schema, SchemaFormat::Json);
        let compact = format_schema(&schema, SchemaFormat::JsonCompact);
        assert!(pretty.contains('\n'));
        assert!(!compact.contains('\n'));
    }
}
