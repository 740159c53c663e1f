//! Local outlier factor on the standardized feature matrix.

use cs_common::DetectionMethod;
use cs_math::mean;
use rayon::prelude::*;

use super::{DetectError, Detector, MethodOutcome};
use crate::features::{PreparedFeatures, N_FEATURES};

/// Floor on the mean reachability distance, so duplicate points keep a
/// finite density.
const MIN_REACH: f64 = 1e-10;

type Row = [f64; N_FEATURES];

#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    pub k: usize,
    pub contamination: f64,
}

fn distance(a: &Row, b: &Row) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// The `k` nearest other rows of `i`, nearest first; ties go to the lower index.
fn neighbours(rows: &[Row], i: usize, k: usize) -> Vec<(usize, f64)> {
    let mut all: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(j, r)| (j, distance(&rows[i], r)))
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    all.truncate(k);
    all
}

impl LocalOutlierFactor {
    /// LOF of every row; values well above 1 are outliers.
    ///
    /// Requires `rows.len() > k`.
    pub fn scores(&self, rows: &[Row]) -> Vec<f64> {
        let k = self.k;
        let knn: Vec<Vec<(usize, f64)>> = (0..rows.len())
            .into_par_iter()
            .map(|i| neighbours(rows, i, k))
            .collect();
        let k_distance: Vec<f64> = knn
            .iter()
            .map(|n| n.last().map(|(_, d)| *d).unwrap_or(0.0))
            .collect();

        let lrd: Vec<f64> = knn
            .iter()
            .map(|n| {
                let reach: Vec<f64> = n.iter().map(|(j, d)| k_distance[*j].max(*d)).collect();
                1.0 / mean(&reach).unwrap_or(0.0).max(MIN_REACH)
            })
            .collect();

        knn.iter()
            .enumerate()
            .map(|(i, n)| {
                let neighbour_lrd: Vec<f64> = n.iter().map(|(j, _)| lrd[*j]).collect();
                mean(&neighbour_lrd).unwrap_or(0.0) / lrd[i]
            })
            .collect()
    }
}

impl Detector for LocalOutlierFactor {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Lof
    }

    fn min_rows(&self) -> usize {
        self.k + 1
    }

    fn detect(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError> {
        let scores = self.scores(features.standardized.rows());
        Ok(MethodOutcome::from_scores(
            self.method(),
            scores,
            self.contamination,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::test_support::{cluster_with_outlier, prepared};

    #[test]
    fn neighbour_ties_break_by_index() {
        let rows = vec![
            [0.0; N_FEATURES],
            [1.0; N_FEATURES],
            [1.0; N_FEATURES],
            [-1.0; N_FEATURES],
        ];
        let n = neighbours(&rows, 0, 2);
        assert_eq!(n.iter().map(|(j, _)| *j).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn uniform_line_has_unit_lof_inside() {
        let rows: Vec<Row> = (0..10).map(|i| [i as f64, 0.0, 0.0, 0.0, 0.0]).collect();
        let lof = LocalOutlierFactor {
            k: 2,
            contamination: 0.1,
        };
        let scores = lof.scores(&rows);
        assert!((scores[5] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn outlier_has_largest_factor() {
        let lof = LocalOutlierFactor {
            k: 5,
            contamination: 0.05,
        };
        let rows = cluster_with_outlier(40);
        let scores = lof.scores(&rows);
        assert!(scores[40] > 2.0);
        let outcome = lof.run(&prepared(rows)).unwrap();
        assert!(outcome.votes[40]);
    }

    #[test]
    fn duplicates_keep_finite_scores() {
        let lof = LocalOutlierFactor {
            k: 3,
            contamination: 0.1,
        };
        let outcome = lof.run(&prepared(vec![[2.0; N_FEATURES]; 8])).unwrap();
        let scores = outcome.scores.unwrap();
        assert!(scores.iter().all(|s| s.is_finite()));
        assert_eq!(outcome.votes.iter().filter(|v| **v).count(), 0);
    }

    #[test]
    fn needs_k_plus_one_rows() {
        let lof = LocalOutlierFactor {
            k: 20,
            contamination: 0.05,
        };
        assert!(lof.run(&prepared(vec![[0.0; N_FEATURES]; 20])).is_err());
        assert!(lof.run(&prepared(vec![[0.0; N_FEATURES]; 21])).is_ok());
    }
}
