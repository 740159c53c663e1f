//! Typed detection configuration.
//!
//! A `DetectionConfig` is the single value threaded through a detection run:
//! which methods vote, every threshold they vote with, how many votes make
//! a flag, and the seed that makes model-based methods reproducible.
//!
//! Files may be TOML or JSON; every field is optional and falls back to the
//! built-in default.
//!
//! ```toml
//! methods = ["zscore", "iqr", "isolation_forest", "lof"]
//! z_threshold = 3.0
//! consensus_threshold = 2
//!
//! [isolation]
//! n_estimators = 100
//! ```

use std::path::Path;

use cs_common::DetectionMethod;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, ValidationResult};

/// Full configuration of one ensemble detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// Configuration schema version.
    pub schema_version: String,

    /// Methods that vote, in output column order.
    pub methods: Vec<DetectionMethod>,

    /// |z| above which the z-score method votes.
    pub z_threshold: f64,

    /// Tukey fence multiplier `k` for the IQR method.
    pub iqr_multiplier: f64,

    /// Lower and upper percentiles (0..=100) for the percentile method.
    pub percentile_bounds: (f64, f64),

    /// |modified z| above which the modified z-score method votes.
    pub modified_z_threshold: f64,

    /// Expected anomaly fraction; calibrates model-based vote thresholds.
    pub contamination: f64,

    /// Neighbourhood size for local outlier factor.
    pub k_neighbors: usize,

    /// Minimum number of votes for the final anomaly flag.
    pub consensus_threshold: usize,

    /// Seed for every randomized method.
    pub random_seed: u64,

    /// Isolation forest parameters.
    pub isolation: IsolationConfig,

    /// Elliptic boundary parameters.
    pub boundary: BoundaryConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            methods: DetectionMethod::default_set(),
            z_threshold: 3.0,
            iqr_multiplier: 1.5,
            percentile_bounds: (1.0, 99.0),
            modified_z_threshold: 3.5,
            contamination: 0.05,
            k_neighbors: 20,
            consensus_threshold: 2,
            random_seed: 42,
            isolation: IsolationConfig::default(),
            boundary: BoundaryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct IsolationConfig {
    /// Number of isolation trees.
    pub n_estimators: usize,

    /// Rows sampled (without replacement) per tree, capped at the batch size.
    pub max_samples: usize,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        IsolationConfig {
            n_estimators: 100,
            max_samples: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct BoundaryConfig {
    /// Ridge added to the covariance diagonal before inversion.
    pub ridge: f64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        BoundaryConfig { ridge: 1e-6 }
    }
}

impl DetectionConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> ValidationResult<Self> {
        toml::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Parse a JSON document.
    pub fn from_json_str(content: &str) -> ValidationResult<Self> {
        serde_json::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Parse file content, choosing the format from the path's extension.
    ///
    /// `.json` is parsed as JSON; everything else as TOML.
    pub fn from_str_for_path(content: &str, path: &Path) -> ValidationResult<Self> {
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(content)
        } else {
            Self::from_toml_str(content)
        }
    }

    /// Read and parse a config file (no semantic validation).
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_str_for_path(&content, path)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> ValidationResult<String> {
        toml::to_string_pretty(self).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Whether `method` is configured to vote.
    pub fn uses(&self, method: DetectionMethod) -> bool {
        self.methods.contains(&method)
    }
}

/// Individual option overrides, typically from CLI flags.
///
/// Applied on top of the file or preset before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub methods: Option<Vec<DetectionMethod>>,
    pub z_threshold: Option<f64>,
    pub iqr_multiplier: Option<f64>,
    pub percentile_bounds: Option<(f64, f64)>,
    pub modified_z_threshold: Option<f64>,
    pub contamination: Option<f64>,
    pub k_neighbors: Option<usize>,
    pub consensus_threshold: Option<usize>,
    pub random_seed: Option<u64>,
    pub n_estimators: Option<usize>,
    pub max_samples: Option<usize>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == ConfigOverrides::default()
    }

    /// Write every set override into `config`.
    pub fn apply(&self, config: &mut DetectionConfig) {
        if let Some(methods) = &self.methods {
            config.methods = methods.clone();
        }
        if let Some(v) = self.z_threshold {
            config.z_threshold = v;
        }
        if let Some(v) = self.iqr_multiplier {
            config.iqr_multiplier = v;
        }
        if let Some(v) = self.percentile_bounds {
            config.percentile_bounds = v;
        }
        if let Some(v) = self.modified_z_threshold {
            config.modified_z_threshold = v;
        }
        if let Some(v) = self.contamination {
            config.contamination = v;
        }
        if let Some(v) = self.k_neighbors {
            config.k_neighbors = v;
        }
        if let Some(v) = self.consensus_threshold {
            config.consensus_threshold = v;
        }
        if let Some(v) = self.random_seed {
            config.random_seed = v;
        }
        if let Some(v) = self.n_estimators {
            config.isolation.n_estimators = v;
        }
        if let Some(v) = self.max_samples {
            config.isolation.max_samples = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.z_threshold, 3.0);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.percentile_bounds, (1.0, 99.0));
        assert_eq!(config.modified_z_threshold, 3.5);
        assert_eq!(config.contamination, 0.05);
        assert_eq!(config.k_neighbors, 20);
        assert_eq!(config.consensus_threshold, 2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.isolation.n_estimators, 100);
        assert_eq!(config.isolation.max_samples, 256);
        assert_eq!(config.methods, DetectionMethod::default_set());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = DetectionConfig::from_toml_str(
            r#"
            z_threshold = 2.5
            methods = ["iqr", "modified_zscore"]

            [isolation]
            n_estimators = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.z_threshold, 2.5);
        assert_eq!(
            config.methods,
            vec![DetectionMethod::Iqr, DetectionMethod::ModifiedZscore]
        );
        assert_eq!(config.isolation.n_estimators, 10);
        assert_eq!(config.isolation.max_samples, 256);
        assert_eq!(config.k_neighbors, 20);
    }

    #[test]
    fn test_json_percentile_bounds_as_array() {
        let config =
            DetectionConfig::from_json_str(r#"{"percentile_bounds": [5, 95]}"#).unwrap();
        assert_eq!(config.percentile_bounds, (5.0, 95.0));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = DetectionConfig::from_toml_str("z_treshold = 2.0").unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = DetectionConfig::default();
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(DetectionConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = DetectionConfig::default();
        let overrides = ConfigOverrides {
            consensus_threshold: Some(1),
            random_seed: Some(7),
            n_estimators: Some(25),
            ..Default::default()
        };
        assert!(!overrides.is_empty());
        overrides.apply(&mut config);
        assert_eq!(config.consensus_threshold, 1);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.isolation.n_estimators, 25);
        assert_eq!(config.z_threshold, 3.0);
        assert!(ConfigOverrides::default().is_empty());
    }
}
