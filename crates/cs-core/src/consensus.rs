//! Consensus voting across the applied detectors.

use std::collections::BTreeMap;

use cs_common::{ClaimId, DetectionMethod};
use cs_config::DetectionConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detect::{DetectError, MethodOutcome};

/// Final verdict for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionResult {
    pub claim_id: ClaimId,
    /// One entry per applied method.
    pub votes: BTreeMap<DetectionMethod, bool>,
    pub vote_count: usize,
    pub final_anomaly_flag: bool,
    /// In [0, 1); orders claims by vote count, then by magnitude.
    pub risk_score: f64,
}

/// Consensus parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consensus {
    /// Minimum number of agreeing methods for a flag.
    pub threshold: usize,
    /// Magnitude at which the tie-break term reaches one half.
    pub magnitude_scale: f64,
}

impl Consensus {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Consensus {
            threshold: config.consensus_threshold,
            magnitude_scale: config.z_threshold,
        }
    }

    /// Combine row-aligned method outcomes into one result per claim.
    ///
    /// `magnitudes[i]` is the largest |standardized value| of row `i`. Every
    /// outcome and the magnitudes must have exactly one entry per claim.
    pub fn aggregate(
        &self,
        claim_ids: &[ClaimId],
        outcomes: &[MethodOutcome],
        magnitudes: &[f64],
    ) -> Result<Vec<DetectionResult>, DetectError> {
        let n = claim_ids.len();
        for outcome in outcomes {
            if outcome.votes.len() != n {
                return Err(DetectError::Misaligned {
                    method: outcome.method,
                    expected: n,
                    got: outcome.votes.len(),
                });
            }
        }
        if magnitudes.len() != n {
            return Err(DetectError::Misaligned {
                method: outcomes
                    .first()
                    .map(|o| o.method)
                    .unwrap_or(DetectionMethod::Zscore),
                expected: n,
                got: magnitudes.len(),
            });
        }

        let applied = outcomes.len();
        Ok(claim_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let votes: BTreeMap<DetectionMethod, bool> =
                    outcomes.iter().map(|o| (o.method, o.votes[i])).collect();
                let vote_count = votes.values().filter(|v| **v).count();
                DetectionResult {
                    claim_id: id.clone(),
                    votes,
                    vote_count,
                    final_anomaly_flag: vote_count >= self.threshold,
                    risk_score: risk_score(
                        vote_count,
                        applied,
                        magnitudes[i],
                        self.magnitude_scale,
                    ),
                }
            })
            .collect())
    }
}

/// `(votes + m / (m + scale)) / (applied + 1)`; 0 when nothing was applied.
pub fn risk_score(votes: usize, applied: usize, magnitude: f64, scale: f64) -> f64 {
    if applied == 0 {
        return 0.0;
    }
    let m = if magnitude.is_finite() {
        magnitude.abs()
    } else {
        0.0
    };
    let tie_break = if m + scale > 0.0 { m / (m + scale) } else { 0.0 };
    let score = (votes as f64 + tie_break) / (applied as f64 + 1.0);
    // Rounding can reach 1.0 for huge magnitudes.
    score.min(LARGEST_BELOW_ONE)
}

const LARGEST_BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;
