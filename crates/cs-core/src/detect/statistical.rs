//! Per-feature statistical detectors on the raw feature matrix.
//!
//! A row votes when any single feature is extreme for its column. Columns
//! without usable spread (zero variance, zero IQR, zero MAD) never vote.

use cs_common::DetectionMethod;
use cs_math::{
    mad, median, quantile_sorted, sorted_finite, Moments, MAD_CONSISTENCY, RELATIVE_SPREAD_FLOOR,
};

use super::{DetectError, Detector, MethodOutcome};
use crate::features::{FeatureMatrix, PreparedFeatures};

/// Per-feature acceptance interval; `None` disables the feature.
type Fence = Option<(f64, f64)>;

/// OR the per-feature "outside the fence" checks of every row.
fn outside_any(matrix: &FeatureMatrix, fences: &[Fence]) -> Vec<bool> {
    matrix
        .rows()
        .iter()
        .map(|row| {
            row.iter().zip(fences).any(|(x, fence)| match fence {
                Some((lo, hi)) => *x < *lo || *x > *hi,
                None => false,
            })
        })
        .collect()
}

/// Standard score against the batch mean and population std.
#[derive(Debug, Clone)]
pub struct ZScoreDetector {
    pub threshold: f64,
}

impl ZScoreDetector {
    pub fn new(threshold: f64) -> Self {
        ZScoreDetector { threshold }
    }

    pub fn votes(&self, matrix: &FeatureMatrix) -> Vec<bool> {
        let moments: Vec<Moments> = matrix.columns().iter().map(|c| Moments::of(c)).collect();
        matrix
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&moments)
                    .filter_map(|(x, m)| m.z(*x, m.spread_floor()))
                    .any(|z| z.abs() > self.threshold)
            })
            .collect()
    }
}

impl Detector for ZScoreDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Zscore
    }

    fn detect(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError> {
        Ok(MethodOutcome::from_votes(self.method(), self.votes(&features.raw)))
    }
}

/// Tukey fences `[Q1 - k·IQR, Q3 + k·IQR]`.
#[derive(Debug, Clone)]
pub struct IqrDetector {
    pub multiplier: f64,
}

impl IqrDetector {
    pub fn new(multiplier: f64) -> Self {
        IqrDetector { multiplier }
    }

    /// Fences of one column, or `None` when the IQR is zero.
    pub fn fence(&self, column: &[f64]) -> Fence {
        let sorted = sorted_finite(column);
        let q1 = quantile_sorted(&sorted, 0.25)?;
        let q3 = quantile_sorted(&sorted, 0.75)?;
        let iqr = q3 - q1;
        if iqr <= 0.0 {
            return None;
        }
        Some((q1 - self.multiplier * iqr, q3 + self.multiplier * iqr))
    }

    pub fn votes(&self, matrix: &FeatureMatrix) -> Vec<bool> {
        let fences: Vec<Fence> = matrix.columns().iter().map(|c| self.fence(c)).collect();
        outside_any(matrix, &fences)
    }
}

impl Detector for IqrDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Iqr
    }

    fn detect(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError> {
        Ok(MethodOutcome::from_votes(self.method(), self.votes(&features.raw)))
    }
}

/// Outside the `[lower, upper]` batch percentiles.
#[derive(Debug, Clone)]
pub struct PercentileDetector {
    pub lower: f64,
    pub upper: f64,
}

impl PercentileDetector {
    pub fn new(lower: f64, upper: f64) -> Self {
        PercentileDetector { lower, upper }
    }

    pub fn votes(&self, matrix: &FeatureMatrix) -> Vec<bool> {
        let fences: Vec<Fence> = matrix
            .columns()
            .iter()
            .map(|col| {
                let sorted = sorted_finite(col);
                let lo = quantile_sorted(&sorted, self.lower / 100.0)?;
                let hi = quantile_sorted(&sorted, self.upper / 100.0)?;
                Some((lo, hi))
            })
            .collect();
        outside_any(matrix, &fences)
    }
}

impl Detector for PercentileDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Percentile
    }

    fn detect(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError> {
        Ok(MethodOutcome::from_votes(self.method(), self.votes(&features.raw)))
    }
}

/// Robust z-score `0.6745·(x - median) / MAD`.
#[derive(Debug, Clone)]
pub struct ModifiedZDetector {
    pub threshold: f64,
}

impl ModifiedZDetector {
    pub fn new(threshold: f64) -> Self {
        ModifiedZDetector { threshold }
    }

    /// Signed modified z-score of `x`, `None` when the MAD is zero.
    pub fn score(column: &[f64], x: f64) -> Option<f64> {
        let (center, spread) = robust_center(column)?;
        Some(MAD_CONSISTENCY * (x - center) / spread)
    }

    pub fn votes(&self, matrix: &FeatureMatrix) -> Vec<bool> {
        let centers: Vec<Option<(f64, f64)>> =
            matrix.columns().iter().map(|c| robust_center(c)).collect();
        matrix
            .rows()
            .iter()
            .map(|row| {
                row.iter().zip(&centers).any(|(x, c)| match c {
                    Some((center, spread)) => {
                        (MAD_CONSISTENCY * (x - center) / spread).abs() > self.threshold
                    }
                    None => false,
                })
            })
            .collect()
    }
}

/// Median and MAD of a column; `None` when the MAD is (numerically) zero.
fn robust_center(column: &[f64]) -> Option<(f64, f64)> {
    let center = median(column)?;
    let spread = mad(column, center)?;
    (spread > RELATIVE_SPREAD_FLOOR * center.abs().max(1.0)).then_some((center, spread))
}

impl Detector for ModifiedZDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::ModifiedZscore
    }

    fn detect(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError> {
        Ok(MethodOutcome::from_votes(self.method(), self.votes(&features.raw)))
    }
}
