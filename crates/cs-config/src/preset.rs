//! Detection presets for common review scenarios.
//!
//! Provides pre-built configurations for:
//! - Standard: the documented defaults
//! - Strict: fewer, higher-confidence flags for audit queues
//! - Sensitive: more flags, for exploratory review of a new data source
//! - Robust: median/quantile methods that tolerate heavy-tailed amounts

use cs_common::DetectionMethod;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::{DetectionConfig, IsolationConfig};

/// Available configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    /// Documented defaults
    Standard,
    /// Higher thresholds, three-vote consensus
    Strict,
    /// Lower thresholds, all statistical methods
    Sensitive,
    /// Median and quantile based methods only
    Robust,
}

impl PresetName {
    /// All available preset names.
    pub const ALL: &'static [PresetName] = &[
        PresetName::Standard,
        PresetName::Strict,
        PresetName::Sensitive,
        PresetName::Robust,
    ];

    /// Get preset name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Standard => "standard",
            PresetName::Strict => "strict",
            PresetName::Sensitive => "sensitive",
            PresetName::Robust => "robust",
        }
    }

    /// Parse preset name from string.
    pub fn parse(s: &str) -> Option<PresetName> {
        match s.to_lowercase().as_str() {
            "standard" | "default" => Some(PresetName::Standard),
            "strict" | "audit" => Some(PresetName::Strict),
            "sensitive" | "explore" => Some(PresetName::Sensitive),
            "robust" | "heavy-tailed" => Some(PresetName::Robust),
            _ => None,
        }
    }

    /// Get a description of the preset.
    pub fn description(&self) -> &'static str {
        match self {
            PresetName::Standard => {
                "Documented defaults: z 3.0, IQR 1.5, 5% contamination, 2 votes"
            }
            PresetName::Strict => {
                "Fewer flags for audit queues: z 3.5, IQR 3.0, 2% contamination, 3 votes"
            }
            PresetName::Sensitive => {
                "Exploratory review: z 2.5, all statistical methods, 10% contamination"
            }
            PresetName::Robust => {
                "Heavy-tailed amounts: IQR, modified z-score, percentile and isolation forest"
            }
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PresetName {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::parse(s).ok_or_else(|| PresetError::UnknownPreset(s.to_string()))
    }
}

/// Errors related to preset operations.
#[derive(Debug, Clone)]
pub enum PresetError {
    /// Unknown preset name.
    UnknownPreset(String),
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetError::UnknownPreset(name) => {
                write!(
                    f,
                    "Unknown preset '{}'. Available: {}",
                    name,
                    PresetName::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }
}

impl std::error::Error for PresetError {}

impl From<PresetError> for cs_common::Error {
    fn from(err: PresetError) -> Self {
        cs_common::Error::UnknownPreset(err.to_string())
    }
}

/// Get the configuration for a preset.
pub fn get_preset(name: PresetName) -> DetectionConfig {
    match name {
        PresetName::Standard => DetectionConfig::default(),
        PresetName::Strict => strict_preset(),
        PresetName::Sensitive => sensitive_preset(),
        PresetName::Robust => robust_preset(),
    }
}

/// Strict preset: only claims most methods agree on.
fn strict_preset() -> DetectionConfig {
    DetectionConfig {
        z_threshold: 3.5,
        iqr_multiplier: 3.0,
        percentile_bounds: (0.5, 99.5),
        modified_z_threshold: 4.0,
        contamination: 0.02,
        consensus_threshold: 3,
        isolation: IsolationConfig {
            n_estimators: 200,
            max_samples: 256,
        },
        ..DetectionConfig::default()
    }
}

/// Sensitive preset: every statistical method plus both default models.
fn sensitive_preset() -> DetectionConfig {
    DetectionConfig {
        methods: vec![
            DetectionMethod::Zscore,
            DetectionMethod::Iqr,
            DetectionMethod::Percentile,
            DetectionMethod::ModifiedZscore,
            DetectionMethod::IsolationForest,
            DetectionMethod::Lof,
        ],
        z_threshold: 2.5,
        modified_z_threshold: 3.0,
        contamination: 0.10,
        k_neighbors: 10,
        consensus_threshold: 2,
        ..DetectionConfig::default()
    }
}

/// Robust preset: no mean/std based method.
fn robust_preset() -> DetectionConfig {
    DetectionConfig {
        methods: vec![
            DetectionMethod::Iqr,
            DetectionMethod::ModifiedZscore,
            DetectionMethod::Percentile,
            DetectionMethod::IsolationForest,
        ],
        consensus_threshold: 2,
        ..DetectionConfig::default()
    }
}

/// Summary of a preset for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetInfo {
    pub name: String,
    pub description: String,
    pub methods: Vec<DetectionMethod>,
    pub z_threshold: f64,
    pub contamination: f64,
    pub consensus_threshold: usize,
}

impl PresetInfo {
    /// Create info from a preset.
    pub fn from_preset(name: PresetName) -> Self {
        let config = get_preset(name);
        Self {
            name: name.as_str().to_string(),
            description: name.description().to_string(),
            methods: config.methods,
            z_threshold: config.z_threshold,
            contamination: config.contamination,
            consensus_threshold: config.consensus_threshold,
        }
    }
}

/// List all available presets with their descriptions.
pub fn list_presets() -> Vec<PresetInfo> {
    PresetName::ALL
        .iter()
        .map(|&name| PresetInfo::from_preset(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_detection;

    #[test]
    fn test_preset_name_parsing() {
        assert_eq!(PresetName::parse("standard"), Some(PresetName::Standard));
        assert_eq!(PresetName::parse("default"), Some(PresetName::Standard));
        assert_eq!(PresetName::parse("STRICT"), Some(PresetName::Strict));
        assert_eq!(PresetName::parse("explore"), Some(PresetName::Sensitive));
        assert_eq!(PresetName::parse("robust"), Some(PresetName::Robust));
        assert_eq!(PresetName::parse("unknown"), None);
    }

    #[test]
    fn test_unknown_preset_lists_available() {
        let err = "lenient".parse::<PresetName>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("lenient"));
        assert!(msg.contains("standard, strict, sensitive, robust"));
    }

    #[test]
    fn test_every_preset_validates() {
        for &name in PresetName::ALL {
            validate_detection(&get_preset(name))
                .unwrap_or_else(|e| panic!("preset {} invalid: {}", name, e));
        }
    }

    #[test]
    fn test_standard_is_default() {
        assert_eq!(get_preset(PresetName::Standard), DetectionConfig::default());
    }

    #[test]
    fn test_strict_is_stricter_than_standard() {
        let strict = get_preset(PresetName::Strict);
        let standard = get_preset(PresetName::Standard);
        assert!(strict.z_threshold > standard.z_threshold);
        assert!(strict.contamination < standard.contamination);
        assert!(strict.consensus_threshold > standard.consensus_threshold);
    }

    #[test]
    fn test_robust_avoids_mean_based_methods() {
        let robust = get_preset(PresetName::Robust);
        assert!(!robust.uses(DetectionMethod::Zscore));
        assert!(robust.uses(DetectionMethod::ModifiedZscore));
    }

    #[test]
    fn test_list_presets() {
        let presets = list_presets();
        assert_eq!(presets.len(), 4);
        assert_eq!(presets[0].name, "standard");
        assert_eq!(presets[1].consensus_threshold, 3);
    }
}
