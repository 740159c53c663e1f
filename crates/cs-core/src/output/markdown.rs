//! Markdown rendering for human review.

use std::fmt::Write;

use serde_json::Value;

use super::DetectionReport;
use crate::summary::SummaryTable;

/// Flagged claims listed in the report, highest risk first.
const MAX_FLAGGED_ROWS: usize = 50;

pub fn render_report(report: &DetectionReport) -> String {
    let meta = &report.metadata;
    let mut out = String::new();
    let _ = writeln!(out, "# Claim anomaly report\n");
    let _ = writeln!(out, "- Run: `{}`", meta.run_id);
    let _ = writeln!(out, "- Claims: {}", meta.claim_count);
    let _ = writeln!(out, "- Flagged: {}", meta.flagged_count);
    let _ = writeln!(
        out,
        "- Methods: {} (consensus {})",
        join(meta.applied_methods.iter().map(|m| m.as_str())),
        meta.consensus_threshold
    );
    for skipped in &meta.skipped_methods {
        let _ = writeln!(out, "- Skipped `{}`: {}", skipped.method, skipped.message);
    }
    let _ = writeln!(out, "- Config hash: `{}`", short_hash(&meta.config_hash));

    let mut flagged: Vec<&serde_json::Map<String, Value>> = report
        .claims
        .iter()
        .filter(|row| row.get("final_anomaly_flag").and_then(Value::as_bool) == Some(true))
        .collect();
    flagged.sort_by(|a, b| risk(b).total_cmp(&risk(a)));

    let _ = writeln!(out, "\n## Flagged claims\n");
    if flagged.is_empty() {
        let _ = writeln!(out, "_No claims flagged._");
    } else {
        let _ = writeln!(out, "| claim_id | procedure | provider | billed | votes | risk |");
        let _ = writeln!(out, "|---|---|---|---:|---:|---:|");
        for row in flagged.iter().take(MAX_FLAGGED_ROWS) {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {:.3} |",
                cell(row.get("claim_id")),
                cell(row.get("procedure_name")),
                cell(row.get("provider_id")),
                cell(row.get("total_billed_amount")),
                cell(row.get("vote_count")),
                risk(row),
            );
        }
        if flagged.len() > MAX_FLAGGED_ROWS {
            let _ = writeln!(out, "\n_{} more not shown._", flagged.len() - MAX_FLAGGED_ROWS);
        }
    }

    for table in &report.summaries {
        out.push('\n');
        out.push_str(&render_summary_table(table));
    }
    out
}

pub fn render_summary_table(table: &SummaryTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## By {}\n", table.group_by);
    let _ = writeln!(
        out,
        "| {} | claims | revenue | paid | avg cost | median cost | std cost \
         | anomalies | rate % | avg risk |",
        table.group_by
    );
    let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|---:|---:|---:|---:|");
    for row in &table.rows {
        let _ = writeln!(
            out,
            "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {} | {:.2} | {:.3} |",
            escape(&row.group_key),
            row.claim_count,
            row.total_revenue,
            row.total_paid,
            row.avg_cost,
            row.median_cost,
            row.std_cost,
            row.anomaly_count,
            row.anomaly_rate_pct,
            row.avg_risk_score,
        );
    }
    out
}

fn risk(row: &serde_json::Map<String, Value>) -> f64 {
    row.get("risk_score").and_then(Value::as_f64).unwrap_or(0.0)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape(s),
        Some(other) => other.to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('|', "\\|")
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}
