//! Quantiles with linear interpolation between order statistics.
//!
//! Matches the default (`linear`) definition used by most dataframe
//! libraries: rank = q * (n - 1), interpolated between neighbours.

/// Copy the finite values of `values` and sort them ascending.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Quantile `q` in [0, 1] of an ascending slice.
///
/// Returns `None` for empty input. `q` is clamped into [0, 1].
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || q.is_nan() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let q = q.clamp(0.0, 1.0);
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    if upper >= sorted.len() {
        return Some(sorted[sorted.len() - 1]);
    }
    if lower == upper {
        return Some(sorted[lower]);
    }
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Quantile `q` in [0, 1] of unsorted input (non-finite values ignored).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted_finite(values), q)
}

/// Percentile `p` in [0, 100] of unsorted input.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    quantile(values, p / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quartiles_of_five_points() {
        let values = [100.0, 105.0, 98.0, 102.0, 5000.0];
        assert_eq!(quantile(&values, 0.25), Some(100.0));
        assert_eq!(quantile(&values, 0.5), Some(102.0));
        assert_eq!(quantile(&values, 0.75), Some(105.0));
    }

    #[test]
    fn interpolates_between_ranks() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let q = quantile(&values, 0.5).unwrap();
        assert!((q - 2.5).abs() < 1e-12);
    }

    #[test]
    fn extremes_are_min_and_max() {
        let values = [3.0, -1.0, 8.0];
        assert_eq!(quantile(&values, 0.0), Some(-1.0));
        assert_eq!(quantile(&values, 1.0), Some(8.0));
        assert_eq!(percentile(&values, 100.0), Some(8.0));
    }

    #[test]
    fn empty_and_nan_inputs() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[f64::NAN, f64::INFINITY], 0.5), None);
        assert_eq!(quantile(&[1.0], f64::NAN), None);
    }

    #[test]
    fn single_value_is_every_quantile() {
        assert_eq!(quantile(&[4.2], 0.01), Some(4.2));
        assert_eq!(quantile(&[4.2], 0.99), Some(4.2));
    }

    #[test]
    fn constant_column_quantiles_coincide() {
        let values = [5.0; 7];
        assert_eq!(percentile(&values, 1.0), Some(5.0));
        assert_eq!(percentile(&values, 99.0), Some(5.0));
    }
}
