//! Detection output: the report document, field selection, and renderers.
//!
//! Payloads go to stdout in one of the [`OutputFormat`]s:
//! - `json`: one [`DetectionReport`] document
//! - `jsonl`: one augmented claim per line
//! - `md`: Markdown tables for humans
//! - `summary`: a single status line

pub mod markdown;

use std::collections::HashSet;

use cs_common::{OutputFormat, SCHEMA_VERSION};
use cs_config::ConfigSnapshot;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::{DetectionRun, RunMetadata};
use crate::summary::SummaryTable;

/// Complete machine-readable result of a `detect` run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DetectionReport {
    pub schema_version: String,
    pub metadata: RunMetadata,
    pub config: ConfigSnapshot,
    /// Input claims with their votes, flag and risk score appended.
    pub claims: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summaries: Vec<SummaryTable>,
}

impl DetectionReport {
    pub fn new(
        run: &DetectionRun<'_>,
        config: ConfigSnapshot,
        summaries: Vec<SummaryTable>,
    ) -> Self {
        DetectionReport {
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: run.metadata().clone(),
            config,
            claims: run.augmented_rows(),
            summaries,
        }
    }

    /// Drop claim columns the selector excludes.
    pub fn select_fields(mut self, selector: &FieldSelector) -> Self {
        for row in &mut self.claims {
            selector.retain(row);
        }
        self
    }

    /// Keep only flagged claims.
    pub fn flagged_only(mut self) -> Self {
        self.claims.retain(|row| {
            row.get("final_anomaly_flag")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        });
        self
    }
}

/// Predefined claim-column sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldPreset {
    /// Id, flag and score.
    Minimal,
    /// Minimal plus votes and the main categorical and billed columns.
    Standard,
    /// Every input and output column.
    #[default]
    Full,
}

/// Claim-column selection for `json`, `jsonl` and `md` output.
#[derive(Debug, Clone, Default)]
pub struct FieldSelector {
    fields: HashSet<String>,
    preset: Option<FieldPreset>,
}

impl FieldSelector {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            preset: None,
        }
    }

    pub fn from_preset(preset: FieldPreset) -> Self {
        Self {
            fields: HashSet::new(),
            preset: Some(preset),
        }
    }

    /// Parse a preset name or a comma-separated column list.
    pub fn parse(spec: &str) -> Result<Self, FieldSelectorError> {
        let spec = spec.trim().to_lowercase();

        match spec.as_str() {
            "minimal" => return Ok(Self::from_preset(FieldPreset::Minimal)),
            "standard" => return Ok(Self::from_preset(FieldPreset::Standard)),
            "full" | "" => return Ok(Self::from_preset(FieldPreset::Full)),
            _ => {}
        }

        let fields: Vec<String> = spec
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if fields.is_empty() {
            return Err(FieldSelectorError::EmptyFieldList);
        }
        if let Some(bad) = fields
            .iter()
            .find(|f| !f.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(FieldSelectorError::InvalidField(bad.clone()));
        }

        Ok(Self::new(fields))
    }

    fn preset_fields(preset: FieldPreset) -> &'static [&'static str] {
        match preset {
            FieldPreset::Minimal => &["claim_id", "final_anomaly_flag", "risk_score"],
            FieldPreset::Standard => &[
                "claim_id",
                "procedure_name",
                "provider_id",
                "insurance_provider",
                "total_billed_amount",
                "vote_count",
                "final_anomaly_flag",
                "risk_score",
            ],
            FieldPreset::Full => &[],
        }
    }

    /// Whether a claim column is kept.
    ///
    /// `claim_id` is always kept; `vote_*` columns ride along with `vote_count`
    /// in the standard preset.
    pub fn includes(&self, field: &str) -> bool {
        if field == "claim_id" {
            return true;
        }
        match self.preset {
            Some(FieldPreset::Full) => true,
            Some(preset) => {
                Self::preset_fields(preset).contains(&field)
                    || (preset == FieldPreset::Standard && field.starts_with("vote_"))
            }
            None => self.fields.is_empty() || self.fields.contains(field),
        }
    }

    pub fn retain(&self, row: &mut Map<String, Value>) {
        row.retain(|k, _| self.includes(k));
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FieldSelectorError {
    #[error("empty field list provided")]
    EmptyFieldList,
    #[error("invalid field name: {0}")]
    InvalidField(String),
}

/// Render a report in `format`.
pub fn render(report: &DetectionReport, format: OutputFormat) -> cs_common::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Jsonl => render_jsonl(&report.claims)?,
        OutputFormat::Md => markdown::render_report(report),
        OutputFormat::Summary => render_summary_line(&report.metadata),
    })
}

/// One JSON object per line, newline-terminated.
pub fn render_jsonl<T: Serialize>(rows: &[T]) -> cs_common::Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

/// `<run_id> claims=<n> flagged=<k> (<pct>%) methods=<a>/<c> [skipped=<m,...>]`
pub fn render_summary_line(meta: &RunMetadata) -> String {
    let pct = if meta.claim_count == 0 {
        0.0
    } else {
        meta.flagged_count as f64 / meta.claim_count as f64 * 100.0
    };
    let mut line = format!(
        "{} claims={} flagged={} ({:.1}%) methods={}/{}",
        meta.run_id,
        meta.claim_count,
        meta.flagged_count,
        pct,
        meta.applied_methods.len(),
        meta.configured_methods.len(),
    );
    if !meta.skipped_methods.is_empty() {
        let skipped: Vec<&str> = meta
            .skipped_methods
            .iter()
            .map(|s| s.method.as_str())
            .collect();
        line.push_str(&format!(" skipped={}", skipped.join(",")));
    }
    line
}
