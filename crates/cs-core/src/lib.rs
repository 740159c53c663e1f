//! Claim Sentinel Core Library
//!
//! Ensemble anomaly detection over billing claims:
//! - Claim ingestion and feature preparation
//! - Statistical and model-based detectors
//! - Consensus voting and risk scoring
//! - Grouped summary tables
//! - Output rendering, JSON schemas and exit codes
//! - Structured logging
//!
//! The binary entry point is in `main.rs`.

pub mod claims;
pub mod config;
pub mod consensus;
pub mod detect;
pub mod engine;
pub mod exit_codes;
pub mod features;
pub mod logging;
pub mod output;
pub mod schema;
pub mod summary;
pub mod synth;

pub use claims::{Claim, ClaimBatch};
pub use consensus::DetectionResult;
pub use engine::{DetectionEngine, DetectionRun, RunMetadata};
pub use summary::{GroupBy, SummaryRow, SummaryTable};
