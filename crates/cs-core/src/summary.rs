//! Grouped summary tables over claims and their detection results.
//!
//! Groups are built from [`GroupAccumulator`]s. An accumulator keeps the raw
//! observations and only sums them at [`GroupAccumulator::finalize`], over
//! sorted values, so accumulating two disjoint batches and merging gives the
//! same bits as accumulating their union.

use std::collections::BTreeMap;

use clap::ValueEnum;
use cs_math::{median, population_std, sorted_finite, stable_sum};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::claims::Claim;

/// Group key for claims whose grouping column is missing.
pub const UNKNOWN_GROUP: &str = "(unknown)";

/// Dimension to group claims by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Procedure,
    Provider,
    Department,
    Insurer,
    /// Calendar month of the service date, `YYYY-MM`.
    Month,
    AdmissionType,
}

impl GroupBy {
    pub const ALL: [GroupBy; 6] = [
        GroupBy::Procedure,
        GroupBy::Provider,
        GroupBy::Department,
        GroupBy::Insurer,
        GroupBy::Month,
        GroupBy::AdmissionType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Procedure => "procedure",
            GroupBy::Provider => "provider",
            GroupBy::Department => "department",
            GroupBy::Insurer => "insurer",
            GroupBy::Month => "month",
            GroupBy::AdmissionType => "admission_type",
        }
    }

    /// Group key of a claim.
    pub fn key_of(&self, claim: &Claim) -> String {
        let value = match self {
            GroupBy::Procedure => claim.procedure_name.clone(),
            GroupBy::Provider => claim.provider_id.clone(),
            GroupBy::Department => claim.department.clone(),
            GroupBy::Insurer => claim.insurance_provider.clone(),
            GroupBy::Month => claim.service_date.map(|d| d.format("%Y-%m").to_string()),
            GroupBy::AdmissionType => claim.admission_type.clone(),
        };
        value.unwrap_or_else(|| UNKNOWN_GROUP.to_string())
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one claim contributes to its group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub billed: f64,
    pub paid: f64,
    pub flagged: bool,
    pub risk_score: f64,
}

/// Mergeable per-group state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAccumulator {
    billed: Vec<f64>,
    paid: Vec<f64>,
    risk: Vec<f64>,
    anomaly_count: usize,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, obs: Observation) {
        self.billed.push(obs.billed);
        self.paid.push(obs.paid);
        self.risk.push(obs.risk_score);
        if obs.flagged {
            self.anomaly_count += 1;
        }
    }

    pub fn merge(&mut self, other: GroupAccumulator) {
        self.billed.extend(other.billed);
        self.paid.extend(other.paid);
        self.risk.extend(other.risk);
        self.anomaly_count += other.anomaly_count;
    }

    pub fn count(&self) -> usize {
        self.billed.len()
    }

    pub fn finalize(&self, group_key: impl Into<String>) -> SummaryRow {
        let claim_count = self.count();
        let billed = sorted_finite(&self.billed);
        let total_revenue = stable_sum(&billed);
        let total_paid = stable_sum(&sorted_finite(&self.paid));
        let total_risk = stable_sum(&sorted_finite(&self.risk));
        let per_claim = |total: f64| {
            if claim_count == 0 {
                0.0
            } else {
                total / claim_count as f64
            }
        };
        SummaryRow {
            group_key: group_key.into(),
            claim_count,
            total_revenue,
            total_paid,
            avg_cost: per_claim(total_revenue),
            median_cost: median(&billed).unwrap_or(0.0),
            std_cost: population_std(&billed).unwrap_or(0.0),
            anomaly_count: self.anomaly_count,
            anomaly_rate_pct: per_claim(self.anomaly_count as f64) * 100.0,
            avg_risk_score: per_claim(total_risk),
        }
    }
}

/// One grouped aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryRow {
    pub group_key: String,
    pub claim_count: usize,
    pub total_revenue: f64,
    pub total_paid: f64,
    pub avg_cost: f64,
    pub median_cost: f64,
    pub std_cost: f64,
    pub anomaly_count: usize,
    /// In [0, 100].
    pub anomaly_rate_pct: f64,
    pub avg_risk_score: f64,
}

/// Ranking for [`SummaryTable::top_rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    ClaimCount,
    AnomalyRate,
    AnomalyCount,
    Revenue,
}

/// Builds a [`SummaryTable`] one observation at a time.
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    group_by: GroupBy,
    groups: BTreeMap<String, GroupAccumulator>,
}

impl SummaryBuilder {
    pub fn new(group_by: GroupBy) -> Self {
        SummaryBuilder {
            group_by,
            groups: BTreeMap::new(),
        }
    }

    /// Pre-register keys so they appear even with no claims.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            self.groups.entry(key.into()).or_default();
        }
        self
    }

    pub fn add(&mut self, key: impl Into<String>, obs: Observation) {
        self.groups.entry(key.into()).or_default().add(obs);
    }

    /// Fold another builder over the same dimension into this one.
    pub fn merge(&mut self, other: SummaryBuilder) {
        for (key, acc) in other.groups {
            self.groups.entry(key).or_default().merge(acc);
        }
    }

    pub fn finish(&self) -> SummaryTable {
        SummaryTable {
            group_by: self.group_by,
            rows: self
                .groups
                .iter()
                .map(|(key, acc)| acc.finalize(key.clone()))
                .collect(),
        }
    }
}

/// Summary rows of one dimension, sorted by group key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryTable {
    pub group_by: GroupBy,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn total_claims(&self) -> usize {
        self.rows.iter().map(|r| r.claim_count).sum()
    }

    pub fn total_anomalies(&self) -> usize {
        self.rows.iter().map(|r| r.anomaly_count).sum()
    }

    pub fn get(&self, group_key: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.group_key == group_key)
    }

    /// The `n` highest-ranked groups, descending; ties by group key.
    pub fn top_rows(&self, n: usize, key: SortKey) -> Vec<&SummaryRow> {
        let mut rows: Vec<&SummaryRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            let ord = match key {
                SortKey::ClaimCount => b.claim_count.cmp(&a.claim_count),
                SortKey::AnomalyCount => b.anomaly_count.cmp(&a.anomaly_count),
                SortKey::AnomalyRate => b.anomaly_rate_pct.total_cmp(&a.anomaly_rate_pct),
                SortKey::Revenue => b.total_revenue.total_cmp(&a.total_revenue),
            };
            ord.then_with(|| a.group_key.cmp(&b.group_key))
        });
        rows.truncate(n);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(billed: f64, flagged: bool) -> Observation {
        Observation {
            billed,
            paid: billed * 0.8,
            flagged,
            risk_score: if flagged { 0.6 } else { 0.1 },
        }
    }

    #[test]
    fn finalize_computes_statistics() {
        let mut acc = GroupAccumulator::new();
        for (b, f) in [(100.0, false), (200.0, true), (300.0, false), (400.0, true)] {
            acc.add(obs(b, f));
        }
        let row = acc.finalize("MRI Scan");
        assert_eq!(row.claim_count, 4);
        assert_eq!(row.total_revenue, 1000.0);
        assert_eq!(row.avg_cost, 250.0);
        assert_eq!(row.median_cost, 250.0);
        assert!((row.std_cost - 125.0_f64.sqrt() * 10.0).abs() < 1e-9);
        assert_eq!(row.anomaly_count, 2);
        assert_eq!(row.anomaly_rate_pct, 50.0);
        assert!((row.total_paid - 800.0).abs() < 1e-9);
        assert!((row.avg_risk_score - 0.35).abs() < 1e-12);
    }

    #[test]
    fn empty_group_is_all_zero() {
        let row = GroupAccumulator::new().finalize("Cigna");
        assert_eq!(row.claim_count, 0);
        assert_eq!(row.anomaly_rate_pct, 0.0);
        assert_eq!(row.avg_cost, 0.0);
        assert_eq!(row.median_cost, 0.0);
        assert_eq!(row.std_cost, 0.0);
        assert!(!row.avg_risk_score.is_nan());
    }

    #[test]
    fn merge_matches_direct_accumulation() {
        let values: Vec<(f64, bool)> = (0..40)
            .map(|i| (0.1 * i as f64 + 1e6 * (i % 3) as f64, i % 7 == 0))
            .collect();
        let mut whole = GroupAccumulator::new();
        let mut left = GroupAccumulator::new();
        let mut right = GroupAccumulator::new();
        for (i, (b, f)) in values.iter().enumerate() {
            whole.add(obs(*b, *f));
            if i % 2 == 0 {
                left.add(obs(*b, *f));
            } else {
                right.add(obs(*b, *f));
            }
        }
        right.merge(left);
        assert_eq!(right.finalize("g"), whole.finalize("g"));
    }

    #[test]
    fn seeded_keys_and_sorting() {
        let mut builder = SummaryBuilder::new(GroupBy::Insurer).with_keys(["Medicaid", "Aetna"]);
        builder.add("Cigna", obs(10.0, true));
        builder.add("Aetna", obs(20.0, false));
        let table = builder.finish();
        let keys: Vec<&str> = table.rows.iter().map(|r| r.group_key.as_str()).collect();
        assert_eq!(keys, vec!["Aetna", "Cigna", "Medicaid"]);
        assert_eq!(table.get("Medicaid").unwrap().claim_count, 0);
        assert_eq!(table.total_claims(), 2);
        assert_eq!(table.total_anomalies(), 1);
    }

    #[test]
    fn builder_merge_over_disjoint_batches() {
        let mut a = SummaryBuilder::new(GroupBy::Procedure);
        a.add("X-Ray", obs(300.0, false));
        a.add("MRI Scan", obs(2500.0, true));
        let mut b = SummaryBuilder::new(GroupBy::Procedure);
        b.add("X-Ray", obs(320.0, true));
        let mut whole = SummaryBuilder::new(GroupBy::Procedure);
        whole.add("X-Ray", obs(300.0, false));
        whole.add("MRI Scan", obs(2500.0, true));
        whole.add("X-Ray", obs(320.0, true));
        a.merge(b);
        assert_eq!(a.finish(), whole.finish());
    }

    #[test]
    fn top_rows_ranks_descending() {
        let mut builder = SummaryBuilder::new(GroupBy::Provider);
        builder.add("DR1001", obs(100.0, true));
        builder.add("DR1002", obs(5000.0, false));
        builder.add("DR1002", obs(50.0, false));
        builder.add("DR1003", obs(10.0, true));
        let table = builder.finish();

        let by_count: Vec<&str> = table
            .top_rows(1, SortKey::ClaimCount)
            .iter()
            .map(|r| r.group_key.as_str())
            .collect();
        assert_eq!(by_count, vec!["DR1002"]);

        let by_rate: Vec<&str> = table
            .top_rows(3, SortKey::AnomalyRate)
            .iter()
            .map(|r| r.group_key.as_str())
            .collect();
        assert_eq!(by_rate, vec!["DR1001", "DR1003", "DR1002"]);

        assert_eq!(table.top_rows(10, SortKey::Revenue).len(), 3);
    }
}
