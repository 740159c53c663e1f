//! Numerically stable batch moments.
//!
//! Claim amounts span several orders of magnitude (a $150 blood test next to
//! a $90k fraudulent surgery line), so plain left-to-right summation loses
//! digits. Sums here use Neumaier compensation and variances use two passes.

use serde::{Deserialize, Serialize};

/// Compensated (Neumaier) sum.
///
/// Deterministic for a given input order. Non-finite inputs propagate.
pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for &v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

/// Arithmetic mean. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

/// Population variance (ddof = 0), two-pass. Returns `None` for empty input.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let squared: Vec<f64> = values.iter().map(|v| (v - m) * (v - m)).collect();
    Some((stable_sum(&squared) / values.len() as f64).max(0.0))
}

/// Population standard deviation (ddof = 0). Returns `None` for empty input.
pub fn population_std(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// Spread below `RELATIVE_SPREAD_FLOOR * max(|mean|, 1)` is treated as zero.
///
/// Mean and variance of a constant column can pick up rounding residue of a
/// few ulps; without a floor that residue would produce huge z-scores.
pub const RELATIVE_SPREAD_FLOOR: f64 = 1e-9;

/// First two moments of a batch column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
}

impl Moments {
    /// Compute moments; empty input yields zero mean and zero spread.
    pub fn of(values: &[f64]) -> Self {
        Moments {
            count: values.len(),
            mean: mean(values).unwrap_or(0.0),
            std: population_std(values).unwrap_or(0.0),
        }
    }

    /// Smallest standard deviation considered a real spread for this column.
    pub fn spread_floor(&self) -> f64 {
        RELATIVE_SPREAD_FLOOR * self.mean.abs().max(1.0)
    }

    /// Whether the column has no usable spread.
    pub fn is_degenerate(&self, min_scale: f64) -> bool {
        !(self.std > min_scale) || !self.std.is_finite()
    }

    /// Standard score of `x`, or `None` when the spread is degenerate.
    pub fn z(&self, x: f64, min_scale: f64) -> Option<f64> {
        if self.is_degenerate(min_scale) {
            None
        } else {
            Some((x - self.mean) / self.std)
        }
    }
}
