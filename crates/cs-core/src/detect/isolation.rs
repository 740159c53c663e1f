//! Isolation forest on the standardized feature matrix.
//!
//! Anomalies sit in sparse regions and are isolated by few random splits.
//! Each tree owns an RNG seeded from `seed + tree_index`, so trees are built
//! in parallel and the same seed over the same batch reproduces the same
//! scores bit for bit.

use cs_common::DetectionMethod;
use cs_math::average_path_length;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::{DetectError, Detector, MethodOutcome};
use crate::features::{PreparedFeatures, N_FEATURES};

type Row = [f64; N_FEATURES];

#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn fit(rows: &[Row], sample: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        IsolationTree {
            root: grow(rows, sample, 0, height_limit, rng),
        }
    }

    /// Depth at which `x` lands, plus `c(size)` for the unresolved leaf.
    fn path_length(&self, x: &Row) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if x[*feature] < *value { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

fn grow(rows: &[Row], indices: Vec<usize>, depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    if depth >= limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let mut candidates: Vec<(usize, f64, f64)> = Vec::with_capacity(N_FEATURES);
    for feature in 0..N_FEATURES {
        let (lo, hi) = indices
            .iter()
            .map(|&i| rows[i][feature])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if hi > lo {
            candidates.push((feature, lo, hi));
        }
    }
    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = candidates[rng.random_range(0..candidates.len())];
    let value = rng.random_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| rows[i][feature] < value);

    Node::Split {
        feature,
        value,
        left: Box::new(grow(rows, left, depth + 1, limit, rng)),
        right: Box::new(grow(rows, right, depth + 1, limit, rng)),
    }
}

impl IsolationForest {
    /// Anomaly score `2^(-E[h(x)] / c(psi))` of every row; higher is more anomalous.
    pub fn scores(&self, rows: &[Row]) -> Vec<f64> {
        let n = rows.len();
        if n == 0 || self.n_estimators == 0 {
            return vec![0.0; n];
        }
        let psi = self.max_samples.min(n);
        let height_limit = (psi as f64).log2().ceil() as usize;
        let norm = average_path_length(psi);

        let trees: Vec<IsolationTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
                let sample = index::sample(&mut rng, n, psi).into_vec();
                IsolationTree::fit(rows, sample, height_limit, &mut rng)
            })
            .collect();

        rows.par_iter()
            .map(|x| {
                let total: f64 = trees.iter().map(|t| t.path_length(x)).sum();
                let mean_depth = total / trees.len() as f64;
                if norm > 0.0 {
                    2f64.powf(-mean_depth / norm)
                } else {
                    0.5
                }
            })
            .collect()
    }
}

impl Detector for IsolationForest {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::IsolationForest
    }

    fn min_rows(&self) -> usize {
        2
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

    fn forest(seed: u64) -> IsolationForest {
        IsolationForest {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.05,
            seed,
        }
    }

    #[test]
    fn outlier_gets_the_highest_score() {
        let rows = cluster_with_outlier(60);
        let scores = forest(42).scores(&rows);
        let (best, _) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(best, 60);
        assert!(scores.iter().all(|s| *s > 0.0 && *s < 1.0));
    }

    #[test]
    fn outlier_votes() {
        let outcome = forest(42).run(&prepared(cluster_with_outlier(60))).unwrap();
        assert!(outcome.votes[60]);
        assert!(outcome.vote_count() <= 4);
        assert!(outcome.threshold.is_some());
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let rows = cluster_with_outlier(40);
        assert_eq!(forest(7).scores(&rows), forest(7).scores(&rows));
    }

    #[test]
    fn seed_changes_scores() {
        let rows = cluster_with_outlier(40);
        assert_ne!(forest(7).scores(&rows), forest(8).scores(&rows));
    }

    #[test]
    fn identical_rows_never_vote() {
        let outcome = forest(1).run(&prepared(vec![[0.0; N_FEATURES]; 30])).unwrap();
        assert_eq!(outcome.vote_count(), 0);
        let scores = outcome.scores.unwrap();
        assert!(scores.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn needs_two_rows() {
        let err = forest(1).run(&prepared(vec![[0.0; N_FEATURES]])).unwrap_err();
        assert!(matches!(
            err,
            DetectError::InsufficientData {
                required: 2,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn subsample_is_capped_by_batch() {
        let rows = cluster_with_outlier(9);
        let small = IsolationForest {
            max_samples: 4,
            ..forest(3)
        };
        assert_eq!(small.scores(&rows).len(), 10);
    }
}
