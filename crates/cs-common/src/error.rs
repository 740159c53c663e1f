//! Error types for Claim Sentinel.
//!
//! Every failure carries a numeric code that stays fixed across releases,
//! a category (config, input, detection, io), and a one-line fix. The CLI
//! renders the same error two ways depending on the output format.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Missing Feature Column
//!   Reason: required feature column 'patient_age' is missing
//!   Fix: Add the column to the input, or check the column names with 'cs-core check'.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 21,
//!   "category": "input",
//!   "message": "required feature column 'patient_age' is missing",
//!   "recoverable": true,
//!   "suggested_action": "fix_input",
//!   "context": { "column": "patient_age" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::method::DetectionMethod;

/// Result type alias for Claim Sentinel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error class; the CLI maps it onto an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and threshold errors.
    Config,
    /// Malformed or incomplete claim input.
    Input,
    /// Detection pipeline errors.
    Detection,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Detection => write!(f, "detection"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// What a calling script should do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run the configuration check command.
    RunCheck,
    /// Correct the claim input and rerun.
    FixInput,
    /// Drop the method from the ensemble and rerun.
    Skip,
    /// Abort the operation.
    Abort,
    /// Needs a person to look at the input.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for Claim Sentinel.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    // Input errors (20-29)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("required feature column '{column}' is missing")]
    MissingFeature { column: String },

    #[error("duplicate claim id '{claim_id}'")]
    DuplicateClaimId { claim_id: String },

    // Detection errors (30-39)
    #[error("{method} needs at least {required} rows, batch has {available}")]
    InsufficientData {
        method: DetectionMethod,
        required: usize,
        available: usize,
    },

    #[error("detection failed: {0}")]
    Detection(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Input errors
    /// - 30-39: Detection errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfiguration(_) => 11,
            Error::UnknownPreset(_) => 12,
            Error::InvalidInput(_) => 20,
            Error::MissingFeature { .. } => 21,
            Error::DuplicateClaimId { .. } => 22,
            Error::InsufficientData { .. } => 30,
            Error::Detection(_) => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Category used for exit-code mapping.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfiguration(_) | Error::UnknownPreset(_) => {
                ErrorCategory::Config
            }
            Error::InvalidInput(_)
            | Error::MissingFeature { .. }
            | Error::DuplicateClaimId { .. } => ErrorCategory::Input,
            Error::InsufficientData { .. } | Error::Detection(_) => ErrorCategory::Detection,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfiguration(_) | Error::UnknownPreset(_) => true,
            Error::InvalidInput(_)
            | Error::MissingFeature { .. }
            | Error::DuplicateClaimId { .. } => true,
            // The method is skipped; the rest of the run continues.
            Error::InsufficientData { .. } => true,
            // Misaligned vectors are a bug, not a data problem.
            Error::Detection(_) => false,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Next step for a calling script.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfiguration(_) | Error::UnknownPreset(_) => {
                SuggestedAction::RunCheck
            }
            Error::InvalidInput(_)
            | Error::MissingFeature { .. }
            | Error::DuplicateClaimId { .. } => SuggestedAction::FixInput,
            Error::InsufficientData { .. } => SuggestedAction::Skip,
            Error::Detection(_) => SuggestedAction::Abort,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'cs-core check' to validate configuration, or check syntax in the config file."
            }
            Error::InvalidConfiguration(_) => {
                "Fix the out-of-range option. 'cs-core config show' prints the effective values."
            }
            Error::UnknownPreset(_) => "List the available presets with 'cs-core config presets'.",
            Error::InvalidInput(_) => {
                "Input must be a JSON array of claim objects or JSON Lines with one claim per line."
            }
            Error::MissingFeature { .. } => {
                "Add the column to the input, or check the column names with 'cs-core check'."
            }
            Error::DuplicateClaimId { .. } => {
                "Claim ids must be unique within a batch. Deduplicate the input and rerun."
            }
            Error::InsufficientData { .. } => {
                "Provide a larger batch, or lower k_neighbors / remove the method from 'methods'."
            }
            Error::Detection(_) => {
                "Internal detection error. Please report it with the input batch."
            }
            Error::Io(_) => "Check that the path exists and is readable/writable, then retry.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' on the file.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfiguration(_) => "Invalid Configuration",
            Error::UnknownPreset(_) => "Unknown Preset",
            Error::InvalidInput(_) => "Invalid Claim Input",
            Error::MissingFeature { .. } => "Missing Feature Column",
            Error::DuplicateClaimId { .. } => "Duplicate Claim Id",
            Error::InsufficientData { .. } => "Insufficient Data",
            Error::Detection(_) => "Detection Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// JSON shape of an error, printed on stdout for machine formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    pub category: ErrorCategory,

    pub message: String,

    /// True when rerunning with different input or config can succeed.
    pub recoverable: bool,

    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., column, claim id).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::MissingFeature { column } => {
                context.insert("column".to_string(), serde_json::json!(column));
            }
            Error::DuplicateClaimId { claim_id } => {
                context.insert("claim_id".to_string(), serde_json::json!(claim_id));
            }
            Error::InsufficientData {
                method,
                required,
                available,
            } => {
                context.insert("method".to_string(), serde_json::json!(method));
                context.insert("required".to_string(), serde_json::json!(required));
                context.insert("available".to_string(), serde_json::json!(available));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Attach one more context entry, e.g. the run id.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Single-line JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

}

/// Render an error for stderr:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
