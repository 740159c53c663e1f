//! Robust location and scale: median and median absolute deviation.

use super::quantile::{quantile_sorted, sorted_finite};

/// Scale factor relating MAD to the standard deviation of a normal sample
/// (`0.6745 ≈ 1 / 1.4826`), as used by the modified z-score.
pub const MAD_CONSISTENCY: f64 = 0.6745;

/// Median of the finite values. Returns `None` when there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted_finite(values), 0.5)
}

/// Median absolute deviation around `center`.
pub fn mad(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - center).abs())
        .collect();
    median(&deviations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn median_ignores_non_finite() {
        assert_eq!(median(&[f64::NAN, 1.0, 5.0, 3.0]), Some(3.0));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn mad_resists_single_outlier() {
        let values = [10.0, 11.0, 9.0, 10.0, 1000.0];
        let m = median(&values).unwrap();
        assert_eq!(m, 10.0);
        assert_eq!(mad(&values, m), Some(1.0));
    }

    #[test]
    fn mad_of_constant_is_zero() {
        assert_eq!(mad(&[2.0; 6], 2.0), Some(0.0));
    }
}
