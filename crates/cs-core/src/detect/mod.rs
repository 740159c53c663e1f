//! Outlier detectors of the ensemble.
//!
//! Every detector is a pure function of one [`PreparedFeatures`] and returns
//! one vote per row, in row order. Statistical detectors read the raw
//! (imputed) matrix; model-based detectors read the standardized matrix and
//! calibrate their vote threshold from `contamination`.

pub mod boundary;
pub mod density;
pub mod isolation;
pub mod statistical;

use cs_common::DetectionMethod;
use cs_config::DetectionConfig;
use cs_math::quantile;
use thiserror::Error;

use crate::features::PreparedFeatures;

pub use boundary::EllipticBoundary;
pub use density::LocalOutlierFactor;
pub use isolation::IsolationForest;
pub use statistical::{IqrDetector, ModifiedZDetector, PercentileDetector, ZScoreDetector};

/// Errors raised by a single detector.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectError {
    #[error("{method} needs at least {required} rows, batch has {available}")]
    InsufficientData {
        method: DetectionMethod,
        required: usize,
        available: usize,
    },

    #[error("{method}: covariance is singular even with ridge {ridge:e}")]
    Singular { method: DetectionMethod, ridge: f64 },

    #[error("{method} produced {got} values for {expected} rows")]
    Misaligned {
        method: DetectionMethod,
        expected: usize,
        got: usize,
    },
}

impl DetectError {
    /// Whether the run can continue without this method.
    pub fn is_skippable(&self) -> bool {
        !matches!(self, DetectError::Misaligned { .. })
    }
}

impl From<DetectError> for cs_common::Error {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::InsufficientData {
                method,
                required,
                available,
            } => cs_common::Error::InsufficientData {
                method,
                required,
                available,
            },
            other => cs_common::Error::Detection(other.to_string()),
        }
    }
}

/// Votes of one method over a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutcome {
    pub method: DetectionMethod,
    pub votes: Vec<bool>,
    /// Per-row anomaly score, model-based methods only.
    pub scores: Option<Vec<f64>>,
    /// Score above which a row votes, model-based methods only.
    pub threshold: Option<f64>,
}

impl MethodOutcome {
    pub fn from_votes(method: DetectionMethod, votes: Vec<bool>) -> Self {
        MethodOutcome {
            method,
            votes,
            scores: None,
            threshold: None,
        }
    }

    pub fn from_scores(method: DetectionMethod, scores: Vec<f64>, contamination: f64) -> Self {
        let (votes, threshold) = contamination_votes(&scores, contamination);
        MethodOutcome {
            method,
            votes,
            scores: Some(scores),
            threshold,
        }
    }

    pub fn vote_count(&self) -> usize {
        self.votes.iter().filter(|v| **v).count()
    }
}

/// One outlier-detection method.
pub trait Detector: Send + Sync {
    fn method(&self) -> DetectionMethod;

    /// Smallest batch the method can score.
    fn min_rows(&self) -> usize {
        0
    }

    /// Score the batch. Implementations may assume `min_rows` holds.
    fn detect(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError>;

    /// Check the batch size, detect, and check the output is row-aligned.
    fn run(&self, features: &PreparedFeatures) -> Result<MethodOutcome, DetectError> {
        let available = features.n_rows();
        if available < self.min_rows() {
            return Err(DetectError::InsufficientData {
                method: self.method(),
                required: self.min_rows(),
                available,
            });
        }
        let outcome = self.detect(features)?;
        if outcome.votes.len() != available {
            return Err(DetectError::Misaligned {
                method: self.method(),
                expected: available,
                got: outcome.votes.len(),
            });
        }
        Ok(outcome)
    }
}

/// Vote for scores strictly above the `1 - contamination` quantile.
///
/// Returns the votes and the threshold. Constant scores never vote.
pub fn contamination_votes(scores: &[f64], contamination: f64) -> (Vec<bool>, Option<f64>) {
    let threshold = quantile(scores, 1.0 - contamination);
    let votes = match threshold {
        Some(t) => scores.iter().map(|s| *s > t).collect(),
        None => vec![false; scores.len()],
    };
    (votes, threshold)
}

/// Instantiate the configured methods, in configuration order.
pub fn build_detectors(config: &DetectionConfig) -> Vec<Box<dyn Detector>> {
    config
        .methods
        .iter()
        .map(|method| build_detector(*method, config))
        .collect()
}

pub fn build_detector(method: DetectionMethod, config: &DetectionConfig) -> Box<dyn Detector> {
    match method {
        DetectionMethod::Zscore => Box::new(ZScoreDetector::new(config.z_threshold)),
        DetectionMethod::Iqr => Box::new(IqrDetector::new(config.iqr_multiplier)),
        DetectionMethod::Percentile => Box::new(PercentileDetector::new(
            config.percentile_bounds.0,
            config.percentile_bounds.1,
        )),
        DetectionMethod::ModifiedZscore => {
            Box::new(ModifiedZDetector::new(config.modified_z_threshold))
        }
        DetectionMethod::IsolationForest => Box::new(IsolationForest {
            n_estimators: config.isolation.n_estimators,
            max_samples: config.isolation.max_samples,
            contamination: config.contamination,
            seed: config.random_seed,
        }),
        DetectionMethod::Lof => Box::new(LocalOutlierFactor {
            k: config.k_neighbors,
            contamination: config.contamination,
        }),
        DetectionMethod::OneClass => Box::new(EllipticBoundary {
            ridge: config.boundary.ridge,
            contamination: config.contamination,
        }),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::features::{FeatureMatrix, PreparedFeatures, ScalerParams, N_FEATURES};

    /// Build prepared features where raw and standardized are the same rows.
    pub fn prepared(rows: Vec<[f64; N_FEATURES]>) -> PreparedFeatures {
        let matrix = FeatureMatrix::from_rows(rows);
        PreparedFeatures {
            raw: matrix.clone(),
            standardized: matrix,
            scaler: ScalerParams {
                means: vec![0.0; N_FEATURES],
                stds: vec![1.0; N_FEATURES],
            },
            imputations: Vec::new(),
        }
    }

    /// `n` rows on a small deterministic lattice plus one far-away row.
    pub fn cluster_with_outlier(n: usize) -> Vec<[f64; N_FEATURES]> {
        let mut rows: Vec<[f64; N_FEATURES]> = (0..n)
            .map(|i| {
                let a = (i % 7) as f64 * 0.1;
                let b = (i % 5) as f64 * 0.1;
                [a, b, a - b, (i % 3) as f64 * 0.1, a + b]
            })
            .collect();
        rows.push([8.0, 8.0, 8.0, 8.0, 8.0]);
        rows
    }
}
