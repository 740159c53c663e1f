//! One-class elliptic boundary: squared Mahalanobis distance to the batch
//! centre under a ridge-regularised covariance.

use cs_common::DetectionMethod;
use cs_math::linalg::{column_means, covariance, mahalanobis_sq, precision};
use ndarray::Array2;

use super::{DetectError, Detector, MethodOutcome};
use crate::features::{PreparedFeatures, N_FEATURES};

/// Each retry multiplies the ridge by this factor.
const RIDGE_GROWTH: f64 = 1e3;
const RIDGE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct EllipticBoundary {
    pub ridge: f64,
    pub contamination: f64,
}

impl EllipticBoundary {
    /// Squared Mahalanobis distance of every row.
    pub fn scores(&self, rows: &[[f64; N_FEATURES]]) -> Result<Vec<f64>, DetectError> {
        let data = Array2::from_shape_fn((rows.len(), N_FEATURES), |(i, j)| rows[i][j]);
        let cov = covariance(&data);

        let mut ridge = self.ridge;
        let mut inverse = precision(&cov, ridge);
        for _ in 1..RIDGE_ATTEMPTS {
            if inverse.is_some() {
                break;
            }
            ridge *= RIDGE_GROWTH;
            inverse = precision(&cov, ridge);
        }
        let inverse = inverse.ok_or(DetectError::Singular {
            method: DetectionMethod::OneClass,
            ridge,
        })?;

        Ok(mahalanobis_sq(&data, &column_means(&data), &inverse).to_vec())
    }
}

impl Detector for EllipticBoundary {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::OneClass
    }

    fn min_rows(&self) -> usize {
        N_FEATURES + 1
    }

    fn detect(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError> {
        let scores = self.scores(features.standardized.rows())?;
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

    fn boundary() -> EllipticBoundary {
        EllipticBoundary {
            ridge: 1e-6,
            contamination: 0.05,
        }
    }

    #[test]
    fn outlier_is_farthest() {
        let rows = cluster_with_outlier(50);
        let scores = boundary().scores(&rows).unwrap();
        let max = scores.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(scores[50], max);
        let outcome = boundary().run(&prepared(rows)).unwrap();
        assert!(outcome.votes[50]);
    }

    #[test]
    fn identity_covariance_is_squared_norm() {
        // Two opposite points per axis: mean 0, unit variance, zero covariance.
        let mut rows = Vec::new();
        for j in 0..N_FEATURES {
            let mut plus = [0.0; N_FEATURES];
            let mut minus = [0.0; N_FEATURES];
            plus[j] = (N_FEATURES as f64).sqrt();
            minus[j] = -(N_FEATURES as f64).sqrt();
            rows.push(plus);
            rows.push(minus);
        }
        let scores = EllipticBoundary {
            ridge: 1e-12,
            contamination: 0.1,
        }
        .scores(&rows)
        .unwrap();
        for s in scores {
            assert!((s - N_FEATURES as f64).abs() < 1e-6);
        }
    }

    #[test]
    fn identical_rows_never_vote() {
        let outcome = boundary().run(&prepared(vec![[0.0; N_FEATURES]; 10])).unwrap();
        assert_eq!(outcome.vote_count(), 0);
    }

    #[test]
    fn collinear_features_are_regularised() {
        let rows: Vec<[f64; N_FEATURES]> =
            (0..20).map(|i| [(i * i) as f64 / 100.0; N_FEATURES]).collect();
        let scores = boundary().scores(&rows).unwrap();
        assert!(scores.iter().all(|s| s.is_finite() && *s >= -1e-9));
        let max = scores.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(scores[19], max);
    }

    #[test]
    fn needs_one_more_row_than_features() {
        let err = boundary()
            .run(&prepared(vec![[0.0; N_FEATURES]; N_FEATURES]))
            .unwrap_err();
        assert!(matches!(err, DetectError::InsufficientData { required: 6, .. }));
    }
}
