//! Detection engine: one validated configuration threaded through the
//! whole pipeline.
//!
//! ```text
//! ClaimBatch -> prepare_features -> detectors (parallel) -> consensus -> DetectionRun
//! ```
//!
//! All statistics are relative to the batch passed to [`DetectionEngine::run`].
//! Splitting a batch into chunks changes means, quartiles, percentiles,
//! medians and contamination thresholds, and therefore votes: chunked runs
//! are a different analysis, not a transparent sharding of one run.

use std::time::Instant;

use chrono::{DateTime, Utc};
use cs_common::{DetectionMethod, Result, RunId};
use cs_config::snapshot::effective_hash;
use cs_config::{validate_detection, DetectionConfig};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::claims::ClaimBatch;
use crate::consensus::{Consensus, DetectionResult};
use crate::detect::{build_detectors, DetectError, Detector, MethodOutcome};
use crate::features::{
    prepare_features, Imputation, PreparedFeatures, ScalerParams, BILLED, PAYMENT_RATE,
};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::summary::{GroupBy, Observation, SummaryBuilder, SummaryTable};

/// Why a configured method did not vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData,
    SingularCovariance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedMethod {
    pub method: DetectionMethod,
    pub reason: SkipReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<usize>,
    pub message: String,
}

impl SkippedMethod {
    fn from_error(method: DetectionMethod, err: &DetectError) -> Self {
        let (reason, required, available) = match err {
            DetectError::InsufficientData {
                required,
                available,
                ..
            } => (SkipReason::InsufficientData, Some(*required), Some(*available)),
            _ => (SkipReason::SingularCovariance, None, None),
        };
        SkippedMethod {
            method,
            reason,
            required,
            available,
            message: err.to_string(),
        }
    }
}

/// Provenance of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunMetadata {
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    pub claim_count: usize,
    pub flagged_count: usize,
    pub configured_methods: Vec<DetectionMethod>,
    pub applied_methods: Vec<DetectionMethod>,
    pub skipped_methods: Vec<SkippedMethod>,
    pub consensus_threshold: usize,
    pub random_seed: u64,
    /// SHA-256 of the effective configuration.
    pub config_hash: String,
    pub scaler: ScalerParams,
    pub imputations: Vec<Imputation>,
    pub duration_ms: u64,
}

pub struct DetectionEngine {
    config: DetectionConfig,
    detectors: Vec<Box<dyn Detector>>,
    consensus: Consensus,
    config_hash: String,
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("methods", &self.config.methods)
            .field("consensus", &self.consensus)
            .field("config_hash", &self.config_hash)
            .finish()
    }
}

impl DetectionEngine {
    /// Validate the configuration and build its detectors.
    ///
    /// Fails with `InvalidConfiguration` before any data is touched.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        validate_detection(&config)?;
        Ok(DetectionEngine {
            detectors: build_detectors(&config),
            consensus: Consensus::from_config(&config),
            config_hash: effective_hash(&config),
            config,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn run<'a>(&self, batch: &'a ClaimBatch) -> Result<DetectionRun<'a>> {
        self.run_with_context(batch, &LogContext::new(RunId::new().to_string()))
    }

    /// Run with an explicit log context, so CLI and engine events share a run id.
    pub fn run_with_context<'a>(
        &self,
        batch: &'a ClaimBatch,
        ctx: &LogContext,
    ) -> Result<DetectionRun<'a>> {
        let started = Instant::now();
        log_event!(
            ctx,
            INFO,
            event_names::RUN_STARTED,
            Stage::Init,
            "detection run started",
            claims = batch.len(),
            methods = self.config.methods.len()
        );

        let features = prepare_features(batch)?;
        for imputation in &features.imputations {
            log_event!(
                ctx,
                DEBUG,
                event_names::FEATURES_IMPUTED,
                Stage::Features,
                "imputed missing values with batch median",
                column = imputation.column.as_str(),
                count = imputation.count,
                value = imputation.value
            );
        }
        log_event!(
            ctx,
            INFO,
            event_names::FEATURES_PREPARED,
            Stage::Features,
            "features prepared",
            rows = features.n_rows(),
            imputed_columns = features.imputations.len()
        );

        let attempts: Vec<(DetectionMethod, std::result::Result<MethodOutcome, DetectError>)> =
            self.detectors
                .par_iter()
                .map(|d| (d.method(), d.run(&features)))
                .collect();

        let mut outcomes = Vec::with_capacity(attempts.len());
        let mut skipped = Vec::new();
        for (method, attempt) in attempts {
            match attempt {
                Ok(outcome) => {
                    log_event!(
                        ctx,
                        DEBUG,
                        event_names::DETECT_METHOD_DONE,
                        Stage::Detect,
                        "method finished",
                        method = method.as_str(),
                        votes = outcome.vote_count()
                    );
                    outcomes.push(outcome);
                }
                Err(err) if err.is_skippable() => {
                    log_event!(
                        ctx,
                        WARN,
                        event_names::DETECT_METHOD_SKIPPED,
                        Stage::Detect,
                        "method skipped",
                        method = method.as_str(),
                        reason = tracing::field::display(&err)
                    );
                    skipped.push(SkippedMethod::from_error(method, &err));
                }
                Err(err) => {
                    log_event!(
                        ctx,
                        ERROR,
                        event_names::INTERNAL_ERROR,
                        Stage::Detect,
                        "detector output is not row-aligned",
                        method = method.as_str(),
                        error = tracing::field::display(&err)
                    );
                    return Err(err.into());
                }
            }
        }

        let results = self
            .consensus
            .aggregate(&batch.ids(), &outcomes, &features.magnitudes())?;
        let flagged_count = results.iter().filter(|r| r.final_anomaly_flag).count();
        log_event!(
            ctx,
            INFO,
            event_names::CONSENSUS_FINISHED,
            Stage::Consensus,
            "consensus finished",
            applied = outcomes.len(),
            skipped = skipped.len(),
            flagged = flagged_count
        );

        let metadata = RunMetadata {
            run_id: RunId::parse(&ctx.run_id).unwrap_or_default(),
            generated_at: Utc::now(),
            claim_count: batch.len(),
            flagged_count,
            configured_methods: self.config.methods.clone(),
            applied_methods: outcomes.iter().map(|o| o.method).collect(),
            skipped_methods: skipped,
            consensus_threshold: self.config.consensus_threshold,
            random_seed: self.config.random_seed,
            config_hash: self.config_hash.clone(),
            scaler: features.scaler.clone(),
            imputations: features.imputations.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log_event!(
            ctx,
            INFO,
            event_names::RUN_FINISHED,
            Stage::Consensus,
            "detection run finished",
            duration_ms = metadata.duration_ms
        );

        Ok(DetectionRun {
            batch,
            features,
            outcomes,
            results,
            metadata,
        })
    }
}

/// Output of one engine run over one batch.
#[derive(Debug, Clone)]
pub struct DetectionRun<'a> {
    batch: &'a ClaimBatch,
    features: PreparedFeatures,
    outcomes: Vec<MethodOutcome>,
    results: Vec<DetectionResult>,
    metadata: RunMetadata,
}

impl<'a> DetectionRun<'a> {
    /// One result per claim, in input order.
    pub fn results(&self) -> &[DetectionResult] {
        &self.results
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn features(&self) -> &PreparedFeatures {
        &self.features
    }

    /// Outcomes of the applied methods, in configuration order.
    pub fn outcomes(&self) -> &[MethodOutcome] {
        &self.outcomes
    }

    pub fn batch(&self) -> &'a ClaimBatch {
        self.batch
    }

    pub fn flagged(&self) -> impl Iterator<Item = &DetectionResult> {
        self.results.iter().filter(|r| r.final_anomaly_flag)
    }

    /// Per-claim contribution to a summary group, in input order.
    ///
    /// Billed amounts are the imputed feature values. Paid amounts fall back
    /// to `billed * payment_rate` when the claim has none.
    pub fn observations(&self) -> Vec<Observation> {
        self.batch
            .claims()
            .iter()
            .zip(&self.results)
            .zip(self.features.raw.rows())
            .map(|((claim, result), row)| Observation {
                billed: row[BILLED],
                paid: claim
                    .insurance_paid_amount
                    .unwrap_or(row[BILLED] * row[PAYMENT_RATE]),
                flagged: result.final_anomaly_flag,
                risk_score: result.risk_score,
            })
            .collect()
    }

    /// Summary builder over this run, for merging with other runs.
    pub fn summary_builder(&self, group_by: GroupBy) -> SummaryBuilder {
        let mut builder = SummaryBuilder::new(group_by);
        for (claim, obs) in self.batch.claims().iter().zip(self.observations()) {
            builder.add(group_by.key_of(claim), obs);
        }
        builder
    }

    pub fn summarize(&self, group_by: GroupBy) -> SummaryTable {
        self.summary_builder(group_by).finish()
    }

    /// Summary that also lists `keys` with no claims in this batch.
    pub fn summarize_with_keys<I, S>(&self, group_by: GroupBy, keys: I) -> SummaryTable
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = SummaryBuilder::new(group_by).with_keys(keys);
        builder.merge(self.summary_builder(group_by));
        builder.finish()
    }

    /// Input rows with `vote_<method>`, `vote_count`, `final_anomaly_flag`
    /// and `risk_score` appended.
    pub fn augmented_rows(&self) -> Vec<Map<String, Value>> {
        self.batch
            .claims()
            .iter()
            .zip(&self.results)
            .map(|(claim, result)| {
                let mut row = claim.raw.clone();
                for outcome in &self.outcomes {
                    let vote = result.votes.get(&outcome.method).copied().unwrap_or(false);
                    row.insert(outcome.method.vote_column(), Value::Bool(vote));
                }
                row.insert("vote_count".into(), Value::from(result.vote_count));
                row.insert(
                    "final_anomaly_flag".into(),
                    Value::Bool(result.final_anomaly_flag),
                );
                row.insert("risk_score".into(), Value::from(result.risk_score));
                row
            })
            .collect()
    }
}
