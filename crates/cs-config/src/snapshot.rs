//! Configuration snapshots for run metadata and reproducibility.
//!
//! A snapshot captures the exact configuration a run used, so a flagged
//! claim can be traced back to the thresholds that flagged it.

use chrono::{DateTime, Utc};
use cs_common::DetectionMethod;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::detection::DetectionConfig;
use crate::resolve::ConfigPath;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the config file was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// How the config was resolved (`cli`, `env`, `xdg`, `default`).
    pub source: String,

    /// Preset the configuration started from, if any.
    #[serde(default)]
    pub preset: Option<String>,

    /// SHA-256 of the raw config file content.
    #[serde(default)]
    pub file_hash: Option<String>,

    /// SHA-256 of the effective configuration (after overrides).
    pub effective_hash: String,

    /// Whether CLI overrides changed any value.
    pub overrides_applied: bool,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSummary {
    pub methods: Vec<DetectionMethod>,
    pub consensus_threshold: usize,
    pub contamination: f64,
    pub random_seed: u64,
}

impl ConfigSnapshot {
    /// Create a new snapshot from the effective configuration.
    pub fn new(
        config: &DetectionConfig,
        location: &ConfigPath,
        preset: Option<&str>,
        file_content: Option<&str>,
        overrides_applied: bool,
    ) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            path: location.path.as_ref().map(|p| p.display().to_string()),
            source: location.source.as_str().to_string(),
            preset: preset.map(str::to_string),
            file_hash: file_content.map(hash_content),
            effective_hash: effective_hash(config),
            overrides_applied,
            summary: ConfigSummary {
                methods: config.methods.clone(),
                consensus_threshold: config.consensus_threshold,
                contamination: config.contamination,
                random_seed: config.random_seed,
            },
        }
    }

    /// Snapshot of the built-in defaults.
    pub fn from_defaults() -> Self {
        ConfigSnapshot::new(
            &DetectionConfig::default(),
            &ConfigPath::default(),
            None,
            None,
            false,
        )
    }

    /// Return true if the run used unmodified built-in defaults.
    pub fn is_default(&self) -> bool {
        self.source == "default" && self.preset.is_none() && !self.overrides_applied
    }
}

/// SHA-256 of arbitrary content, hex encoded.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of the canonical JSON form of an effective configuration.
///
/// Two configs that would produce identical detection results hash equal,
/// regardless of file format or which keys were spelled out.
pub fn effective_hash(config: &DetectionConfig) -> String {
    let canonical = serde_json::to_string(config).unwrap_or_default();
    hash_content(&canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConfigSource;
    use std::path::PathBuf;

    #[test]
    fn test_hash_is_hex_sha256() {
        let h = hash_content("");
        assert_eq!(
            h,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_effective_hash_ignores_spelling() {
        let spelled_out = DetectionConfig::from_toml_str("z_threshold = 3.0").unwrap();
        assert_eq!(
            effective_hash(&spelled_out),
            effective_hash(&DetectionConfig::default())
        );
        let changed = DetectionConfig::from_toml_str("z_threshold = 2.0").unwrap();
        assert_ne!(
            effective_hash(&changed),
            effective_hash(&DetectionConfig::default())
        );
    }

    #[test]
    fn test_defaults_snapshot() {
        let snapshot = ConfigSnapshot::from_defaults();
        assert!(snapshot.is_default());
        assert!(snapshot.path.is_none());
        assert!(snapshot.file_hash.is_none());
        assert_eq!(snapshot.summary.consensus_threshold, 2);
    }

    #[test]
    fn test_file_snapshot_records_provenance() {
        let location = ConfigPath {
            path: Some(PathBuf::from("/etc/cs/detection.toml")),
            source: ConfigSource::CliArgument,
        };
        let snapshot = ConfigSnapshot::new(
            &DetectionConfig::default(),
            &location,
            None,
            Some("z_threshold = 3.0"),
            false,
        );
        assert!(!snapshot.is_default());
        assert_eq!(snapshot.source, "cli");
        assert_eq!(snapshot.path.as_deref(), Some("/etc/cs/detection.toml"));
        assert_eq!(snapshot.file_hash, Some(hash_content("z_threshold = 3.0")));
    }
}
