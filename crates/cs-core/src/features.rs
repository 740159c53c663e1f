//! Feature preparation.
//!
//! Turns a claim batch into two NaN-free matrices with one row per claim and
//! a fixed column order:
//!
//! | column | source |
//! |--------|--------|
//! | `total_billed_amount` | input |
//! | `patient_age` | input |
//! | `length_of_stay` | input |
//! | `payment_rate` | input, or `insurance_paid_amount / total_billed_amount` |
//! | `cost_per_day` | `total_billed_amount / max(length_of_stay, 1)` |
//!
//! Missing values are imputed with the **batch** median of their column, and
//! standardization uses the batch mean and population std. Both are relative
//! to the batch: the same claim can get different features (and votes) in a
//! different batch.

use cs_common::{Error, Result};
use cs_math::{median, Moments};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::claims::{columns, Claim, ClaimBatch};

/// Feature column names, in matrix order.
pub const FEATURE_NAMES: [&str; 5] = [
    columns::TOTAL_BILLED_AMOUNT,
    columns::PATIENT_AGE,
    columns::LENGTH_OF_STAY,
    columns::PAYMENT_RATE,
    "cost_per_day",
];

/// Number of feature columns.
pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Index of `total_billed_amount` in a feature row.
pub const BILLED: usize = 0;
/// Index of `payment_rate` in a feature row.
pub const PAYMENT_RATE: usize = 3;

/// Row-major numeric matrix, one row per claim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<[f64; N_FEATURES]>,
}

impl FeatureMatrix {
    pub fn from_rows(rows: Vec<[f64; N_FEATURES]>) -> Self {
        FeatureMatrix { rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        N_FEATURES
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[[f64; N_FEATURES]] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> &[f64; N_FEATURES] {
        &self.rows[i]
    }

    /// Copy of column `j`.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[j]).collect()
    }

    /// All columns, column-major.
    pub fn columns(&self) -> Vec<Vec<f64>> {
        (0..N_FEATURES).map(|j| self.column(j)).collect()
    }
}

/// Per-column location and scale used for standardization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScalerParams {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// How many values of one column were imputed, and with what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Imputation {
    pub column: String,
    pub count: usize,
    pub value: f64,
}

/// Output of feature preparation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFeatures {
    /// Imputed values in original units.
    pub raw: FeatureMatrix,
    /// Per-column z-scores of `raw`; zero-variance columns are all 0.
    pub standardized: FeatureMatrix,
    pub scaler: ScalerParams,
    /// Only columns with at least one imputed value.
    pub imputations: Vec<Imputation>,
}

impl PreparedFeatures {
    pub fn n_rows(&self) -> usize {
        self.raw.n_rows()
    }

    /// Largest |standardized value| of each row.
    pub fn magnitudes(&self) -> Vec<f64> {
        self.standardized
            .rows()
            .iter()
            .map(|r| r.iter().fold(0.0_f64, |m, v| m.max(v.abs())))
            .collect()
    }
}

/// Prepare the feature matrices of a batch.
///
/// Fails with `MissingFeature` when a non-empty batch lacks a feature column,
/// or when a column has no observed value to impute from. An empty batch
/// yields empty matrices.
pub fn prepare_features(batch: &ClaimBatch) -> Result<PreparedFeatures> {
    if batch.is_empty() {
        return Ok(PreparedFeatures {
            raw: FeatureMatrix::default(),
            standardized: FeatureMatrix::default(),
            scaler: ScalerParams {
                means: vec![0.0; N_FEATURES],
                stds: vec![0.0; N_FEATURES],
            },
            imputations: Vec::new(),
        });
    }

    for column in [
        columns::TOTAL_BILLED_AMOUNT,
        columns::PATIENT_AGE,
        columns::LENGTH_OF_STAY,
    ] {
        require_column(batch, column)?;
    }
    let rate_source = if batch.has_column(columns::PAYMENT_RATE) {
        RateSource::Column
    } else if batch.has_column(columns::INSURANCE_PAID_AMOUNT) {
        RateSource::Derived
    } else {
        return Err(Error::MissingFeature {
            column: columns::PAYMENT_RATE.to_string(),
        });
    };
    // Per-row nulls are allowed and group under the unknown label.
    for column in columns::DIMENSIONS {
        require_column(batch, column)?;
    }

    let claims = batch.claims();
    let mut imputations = Vec::new();
    let billed = impute(
        columns::TOTAL_BILLED_AMOUNT,
        claims.iter().map(|c| c.total_billed_amount).collect(),
        &mut imputations,
    )?;
    let age = impute(
        columns::PATIENT_AGE,
        claims.iter().map(|c| c.patient_age).collect(),
        &mut imputations,
    )?;
    let stay = impute(
        columns::LENGTH_OF_STAY,
        claims.iter().map(|c| c.length_of_stay).collect(),
        &mut imputations,
    )?;
    let rate = impute(
        columns::PAYMENT_RATE,
        claims.iter().map(|c| rate_source.rate(c)).collect(),
        &mut imputations,
    )?;

    let rows: Vec<[f64; N_FEATURES]> = (0..claims.len())
        .map(|i| {
            let cost_per_day = billed[i] / stay[i].max(1.0);
            [billed[i], age[i], stay[i], rate[i], cost_per_day]
        })
        .collect();
    let raw = FeatureMatrix::from_rows(rows);

    let moments: Vec<Moments> = (0..N_FEATURES)
        .map(|j| Moments::of(&raw.column(j)))
        .collect();
    let standardized = FeatureMatrix::from_rows(
        raw.rows()
            .iter()
            .map(|r| {
                let mut z = [0.0; N_FEATURES];
                for (j, m) in moments.iter().enumerate() {
                    z[j] = m.z(r[j], m.spread_floor()).unwrap_or(0.0);
                }
                z
            })
            .collect(),
    );

    Ok(PreparedFeatures {
        raw,
        standardized,
        scaler: ScalerParams {
            means: moments.iter().map(|m| m.mean).collect(),
            stds: moments.iter().map(|m| m.std).collect(),
        },
        imputations,
    })
}

enum RateSource {
    Column,
    Derived,
}

impl RateSource {
    fn rate(&self, claim: &Claim) -> Option<f64> {
        match self {
            RateSource::Column => claim.payment_rate,
            RateSource::Derived => match (claim.insurance_paid_amount, claim.total_billed_amount) {
                (Some(paid), Some(billed)) if billed > 0.0 => Some(paid / billed),
                _ => None,
            },
        }
    }
}

fn require_column(batch: &ClaimBatch, column: &str) -> Result<()> {
    if batch.has_column(column) {
        Ok(())
    } else {
        Err(Error::MissingFeature {
            column: column.to_string(),
        })
    }
}

fn impute(
    column: &str,
    values: Vec<Option<f64>>,
    imputations: &mut Vec<Imputation>,
) -> Result<Vec<f64>> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    let fill = median(&observed).ok_or_else(|| Error::MissingFeature {
        column: column.to_string(),
    })?;
    let missing = values.len() - observed.len();
    if missing > 0 {
        imputations.push(Imputation {
            column: column.to_string(),
            count: missing,
            value: fill,
        });
    }
    Ok(values.into_iter().map(|v| v.unwrap_or(fill)).collect())
}
