//! Synthetic claim batches for tests, benches, and the `generate` command.
//!
//! Rows are realistic enough to exercise every detector: procedure costs,
//! insurer coverage, multi-day stays, and a fraction of injected anomalies.
//! Output is a pure function of the options; service dates are anchored to
//! a fixed day rather than the clock.

use chrono::{Duration, NaiveDate};
use cs_common::{Error, Result};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::claims::ClaimBatch;

struct Procedure {
    name: &'static str,
    base_cost: f64,
    variance: f64,
    frequency: f64,
}

const PROCEDURES: [Procedure; 9] = [
    Procedure { name: "Emergency Room Visit", base_cost: 1200.0, variance: 400.0, frequency: 0.15 },
    Procedure { name: "Routine Checkup", base_cost: 250.0, variance: 50.0, frequency: 0.25 },
    Procedure { name: "Blood Test", base_cost: 150.0, variance: 30.0, frequency: 0.20 },
    Procedure { name: "X-Ray", base_cost: 300.0, variance: 75.0, frequency: 0.12 },
    Procedure { name: "MRI Scan", base_cost: 2500.0, variance: 500.0, frequency: 0.05 },
    Procedure { name: "CT Scan", base_cost: 1800.0, variance: 300.0, frequency: 0.08 },
    Procedure { name: "Surgery - Minor", base_cost: 5000.0, variance: 1000.0, frequency: 0.04 },
    Procedure { name: "Surgery - Major", base_cost: 25000.0, variance: 8000.0, frequency: 0.02 },
    Procedure { name: "Physical Therapy", base_cost: 180.0, variance: 40.0, frequency: 0.09 },
];

const ROUTINE_CHECKUP: &str = "Routine Checkup";
const MAJOR_SURGERY: &str = "Surgery - Major";

/// (name, coverage rate, frequency)
const INSURERS: [(&str, f64, f64); 6] = [
    ("BlueCross BlueShield", 0.80, 0.25),
    ("Aetna", 0.75, 0.20),
    ("UnitedHealth", 0.82, 0.22),
    ("Cigna", 0.78, 0.15),
    ("Medicare", 0.85, 0.10),
    ("Medicaid", 0.90, 0.08),
];

pub const DEPARTMENTS: [&str; 10] = [
    "Emergency Medicine",
    "Internal Medicine",
    "Cardiology",
    "Orthopedics",
    "Radiology",
    "Surgery",
    "Pediatrics",
    "Neurology",
    "Oncology",
    "Psychiatry",
];

const DIAGNOSES: [&str; 12] = [
    "Z00.00", "I10", "E11.9", "M79.1", "R53.83", "K21.9", "F41.1", "M25.511", "N39.0", "R50.9",
    "H52.4", "J06.9",
];

const CLAIM_STATUS: [(&str, f64); 3] = [("Paid", 0.85), ("Pending", 0.10), ("Denied", 0.05)];

const ADMISSION_TYPES: [(&str, f64); 3] =
    [("Outpatient", 0.70), ("Inpatient", 0.20), ("Emergency", 0.10)];

/// Days covered by service dates, ending at the anchor.
const DATE_SPAN_DAYS: i64 = 730;

/// Kind of anomaly planted in a synthetic row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectedAnomaly {
    /// Billed amount multiplied by 2-5.
    BillingError,
    /// Next row copies this row's patient, procedure and date.
    DuplicateClaim,
    /// Routine checkup billed 10-20 times over; other procedures unchanged.
    UnusualCost,
    /// Rewritten as a major surgery billed 50k-100k.
    FraudIndicator,
}

impl InjectedAnomaly {
    const ALL: [InjectedAnomaly; 4] = [
        InjectedAnomaly::BillingError,
        InjectedAnomaly::DuplicateClaim,
        InjectedAnomaly::UnusualCost,
        InjectedAnomaly::FraudIndicator,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    pub count: usize,
    pub seed: u64,
    /// Fraction of rows receiving an injected anomaly, in [0, 1].
    pub anomaly_rate: f64,
    /// Last possible service date.
    pub anchor: NaiveDate,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            count: 1000,
            seed: 42,
            anomaly_rate: 0.05,
            anchor: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticClaims {
    pub rows: Vec<Value>,
    /// Row index and kind of every injected anomaly, by row index.
    pub injected: Vec<(usize, InjectedAnomaly)>,
}

impl SyntheticClaims {
    pub fn into_batch(self) -> Result<ClaimBatch> {
        ClaimBatch::from_values(self.rows)
    }
}

/// Generate `count` claim objects.
pub fn generate_claims(count: usize, seed: u64, anomaly_rate: f64) -> Result<Vec<Value>> {
    let data = generate(&GeneratorOptions {
        count,
        seed,
        anomaly_rate,
        ..Default::default()
    })?;
    Ok(data.rows)
}

pub fn generate(options: &GeneratorOptions) -> Result<SyntheticClaims> {
    let samplers = Samplers::new()?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let start = options.anchor - Duration::days(DATE_SPAN_DAYS);

    let mut rows: Vec<Row> = (0..options.count)
        .map(|i| Row::random(i, start, &samplers, &mut rng))
        .collect();

    let rate = options.anomaly_rate.clamp(0.0, 1.0);
    let n_anomalies = (options.count as f64 * rate) as usize;
    let mut picked = index::sample(&mut rng, options.count, n_anomalies).into_vec();
    picked.sort_unstable();

    let mut injected = Vec::with_capacity(picked.len());
    for idx in picked {
        let kind = InjectedAnomaly::ALL[rng.random_range(0..InjectedAnomaly::ALL.len())];
        match kind {
            InjectedAnomaly::BillingError => {
                rows[idx].billed *= rng.random_range(2.0..5.0);
            }
            InjectedAnomaly::DuplicateClaim => {
                if idx + 1 < rows.len() {
                    let (patient, procedure, date) = (
                        rows[idx].patient_id.clone(),
                        rows[idx].procedure,
                        rows[idx].service_date,
                    );
                    let next = &mut rows[idx + 1];
                    next.patient_id = patient;
                    next.procedure = procedure;
                    next.service_date = date;
                }
            }
            InjectedAnomaly::UnusualCost => {
                if rows[idx].procedure == ROUTINE_CHECKUP {
                    rows[idx].billed *= rng.random_range(10.0..20.0);
                }
            }
            InjectedAnomaly::FraudIndicator => {
                rows[idx].procedure = MAJOR_SURGERY;
                rows[idx].billed = rng.random_range(50_000.0..100_000.0);
            }
        }
        injected.push((idx, kind));
    }

    Ok(SyntheticClaims {
        rows: rows.iter().map(Row::to_json).collect(),
        injected,
    })
}

/// Distributions behind every random row.
struct Samplers {
    age: Normal<f64>,
    procedure: WeightedIndex<f64>,
    /// One cost distribution per entry of `PROCEDURES`.
    cost: Vec<Normal<f64>>,
    insurer: WeightedIndex<f64>,
    status: WeightedIndex<f64>,
    admission: WeightedIndex<f64>,
}

impl Samplers {
    fn new() -> Result<Self> {
        let cost = PROCEDURES
            .iter()
            .map(|p| Normal::new(p.base_cost, p.variance))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(table_error)?;
        Ok(Samplers {
            age: Normal::new(45.0, 18.0).map_err(table_error)?,
            procedure: WeightedIndex::new(PROCEDURES.iter().map(|p| p.frequency))
                .map_err(table_error)?,
            cost,
            insurer: WeightedIndex::new(INSURERS.iter().map(|x| x.2)).map_err(table_error)?,
            status: WeightedIndex::new(CLAIM_STATUS.iter().map(|x| x.1)).map_err(table_error)?,
            admission: WeightedIndex::new(ADMISSION_TYPES.iter().map(|x| x.1))
                .map_err(table_error)?,
        })
    }
}

fn table_error(err: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("synthetic distribution table: {}", err))
}

struct Row {
    index: usize,
    patient_id: String,
    patient_age: u32,
    service_date: NaiveDate,
    procedure: &'static str,
    procedure_code: u32,
    diagnosis: &'static str,
    department: &'static str,
    provider: u32,
    insurer: &'static str,
    billed: f64,
    paid: f64,
    status: &'static str,
    admission_type: &'static str,
    length_of_stay: u32,
}

impl Row {
    fn random(i: usize, start: NaiveDate, samplers: &Samplers, rng: &mut StdRng) -> Self {
        let age = samplers.age.sample(rng).clamp(1.0, 95.0) as u32;
        let p = samplers.procedure.sample(rng);
        let procedure = &PROCEDURES[p];
        let billed = samplers.cost[p].sample(rng).max(50.0);
        let (insurer, coverage, _) = INSURERS[samplers.insurer.sample(rng)];
        let paid = billed * coverage * rng.random_range(0.85..1.0);
        let length_of_stay = if rng.random::<f64>() < 0.3 {
            rng.random_range(1..=15)
        } else {
            1
        };

        Row {
            index: i,
            patient_id: format!("P{:06}", 10_000 + i),
            patient_age: age,
            service_date: start + Duration::days(rng.random_range(0..=DATE_SPAN_DAYS)),
            procedure: procedure.name,
            procedure_code: rng.random_range(10_000..=99_999),
            diagnosis: DIAGNOSES[rng.random_range(0..DIAGNOSES.len())],
            department: DEPARTMENTS[rng.random_range(0..DEPARTMENTS.len())],
            provider: rng.random_range(1000..=9999),
            insurer,
            billed,
            paid,
            status: CLAIM_STATUS[samplers.status.sample(rng)].0,
            admission_type: ADMISSION_TYPES[samplers.admission.sample(rng)].0,
            length_of_stay,
        }
    }

    fn to_json(&self) -> Value {
        let billed = cents(self.billed);
        let paid = cents(self.paid);
        json!({
            "claim_id": format!("CLM{:08}", 20_240_000 + self.index),
            "patient_id": self.patient_id,
            "patient_age": self.patient_age,
            "service_date": self.service_date.format("%Y-%m-%d").to_string(),
            "procedure_name": self.procedure,
            "procedure_code": format!("CPT{}", self.procedure_code),
            "primary_diagnosis": self.diagnosis,
            "department": self.department,
            "provider_id": format!("DR{}", self.provider),
            "insurance_provider": self.insurer,
            "total_billed_amount": billed,
            "insurance_paid_amount": paid,
            "patient_responsibility": cents(billed - paid),
            "claim_status": self.status,
            "admission_type": self.admission_type,
            "length_of_stay": self.length_of_stay,
            "payment_rate": paid / billed,
        })
    }
}

fn cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
