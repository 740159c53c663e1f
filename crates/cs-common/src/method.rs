//! Detection method identifiers.

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broad family of a detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Per-feature batch statistics on the raw feature matrix.
    Statistical,
    /// Multivariate models on the standardized feature matrix.
    ModelBased,
}

/// One outlier-detection method of the ensemble.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ValueEnum,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Standard score against the batch mean and population std.
    Zscore,
    /// Tukey fences around the interquartile range.
    Iqr,
    /// Outside the configured lower/upper batch percentiles.
    Percentile,
    /// Median/MAD based robust z-score.
    ModifiedZscore,
    /// Random isolation trees.
    IsolationForest,
    /// Local outlier factor.
    Lof,
    /// Elliptic (Mahalanobis) boundary around the batch.
    OneClass,
}

impl DetectionMethod {
    /// Every method, in canonical order.
    pub const ALL: [DetectionMethod; 7] = [
        DetectionMethod::Zscore,
        DetectionMethod::Iqr,
        DetectionMethod::Percentile,
        DetectionMethod::ModifiedZscore,
        DetectionMethod::IsolationForest,
        DetectionMethod::Lof,
        DetectionMethod::OneClass,
    ];

    /// Methods applied when the configuration does not name any.
    pub fn default_set() -> Vec<DetectionMethod> {
        vec![
            DetectionMethod::Zscore,
            DetectionMethod::Iqr,
            DetectionMethod::IsolationForest,
            DetectionMethod::Lof,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Zscore => "zscore",
            DetectionMethod::Iqr => "iqr",
            DetectionMethod::Percentile => "percentile",
            DetectionMethod::ModifiedZscore => "modified_zscore",
            DetectionMethod::IsolationForest => "isolation_forest",
            DetectionMethod::Lof => "lof",
            DetectionMethod::OneClass => "one_class",
        }
    }

    pub fn kind(&self) -> MethodKind {
        match self {
            DetectionMethod::Zscore
            | DetectionMethod::Iqr
            | DetectionMethod::Percentile
            | DetectionMethod::ModifiedZscore => MethodKind::Statistical,
            DetectionMethod::IsolationForest | DetectionMethod::Lof | DetectionMethod::OneClass => {
                MethodKind::ModelBased
            }
        }
    }

    /// Column name of this method's vote in the augmented claim table.
    pub fn vote_column(&self) -> String {
        format!("vote_{}", self.as_str())
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "zscore" | "z_score" => Ok(DetectionMethod::Zscore),
            "iqr" => Ok(DetectionMethod::Iqr),
            "percentile" => Ok(DetectionMethod::Percentile),
            "modified_zscore" | "modified_z_score" | "mad" => Ok(DetectionMethod::ModifiedZscore),
            "isolation_forest" | "iforest" => Ok(DetectionMethod::IsolationForest),
            "lof" | "local_outlier_factor" => Ok(DetectionMethod::Lof),
            "one_class" | "one_class_svm" | "elliptic" => Ok(DetectionMethod::OneClass),
            other => Err(format!("unknown detection method '{}'", other)),
        }
    }
}
