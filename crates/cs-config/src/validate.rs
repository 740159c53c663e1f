//! Configuration validation errors and semantic validation.

use std::collections::HashSet;

use thiserror::Error;

use crate::detection::DetectionConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

impl From<ValidationError> for cs_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::IoError(msg) | ValidationError::ParseError(msg) => {
                cs_common::Error::Config(msg)
            }
            other => cs_common::Error::InvalidConfiguration(other.to_string()),
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn require_positive(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(field, format!("Must be a positive number, got {}", value)));
    }
    Ok(())
}

/// Validate a detection configuration semantically.
///
/// Every check runs before any data is touched; a failure here is fatal for
/// the run.
pub fn validate_detection(config: &DetectionConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.methods.is_empty() {
        return Err(ValidationError::SemanticError(
            "methods must name at least one detection method".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for method in &config.methods {
        if !seen.insert(*method) {
            return Err(invalid("methods", format!("'{}' is listed twice", method)));
        }
    }

    require_positive("z_threshold", config.z_threshold)?;
    require_positive("modified_z_threshold", config.modified_z_threshold)?;

    if !config.iqr_multiplier.is_finite() || config.iqr_multiplier < 0.0 {
        return Err(invalid(
            "iqr_multiplier",
            format!("Must be non-negative, got {}", config.iqr_multiplier),
        ));
    }

    let (lower, upper) = config.percentile_bounds;
    if !(lower.is_finite() && upper.is_finite()) || lower < 0.0 || upper > 100.0 || lower >= upper
    {
        return Err(invalid(
            "percentile_bounds",
            format!("Must satisfy 0 <= lower < upper <= 100, got ({}, {})", lower, upper),
        ));
    }

    if !config.contamination.is_finite()
        || config.contamination <= 0.0
        || config.contamination > 0.5
    {
        return Err(invalid(
            "contamination",
            format!("Must be in (0, 0.5], got {}", config.contamination),
        ));
    }

    if config.k_neighbors == 0 {
        return Err(invalid("k_neighbors", "Must be at least 1"));
    }

    if config.consensus_threshold == 0 {
        return Err(invalid(
            "consensus_threshold",
            "Must be at least 1 (0 would flag every claim)",
        ));
    }
    if config.consensus_threshold > config.methods.len() {
        return Err(invalid(
            "consensus_threshold",
            format!(
                "{} exceeds the {} configured method(s); no claim could ever be flagged",
                config.consensus_threshold,
                config.methods.len()
            ),
        ));
    }

    if config.isolation.n_estimators == 0 {
        return Err(invalid("isolation.n_estimators", "Must be at least 1"));
    }
    if config.isolation.max_samples < 2 {
        return Err(invalid(
            "isolation.max_samples",
            format!("Must be at least 2, got {}", config.isolation.max_samples),
        ));
    }

    require_positive("boundary.ridge", config.boundary.ridge)?;

    Ok(())
}
