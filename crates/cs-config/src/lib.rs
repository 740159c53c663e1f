//! Claim Sentinel detection configuration loading and validation.
//!
//! This crate provides:
//! - A typed `DetectionConfig` with the ensemble's thresholds and methods
//! - Named presets (standard, strict, sensitive, robust)
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation of every threshold
//! - Config snapshots with content hashes for run metadata

pub mod detection;
pub mod load;
pub mod preset;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use detection::{BoundaryConfig, ConfigOverrides, DetectionConfig, IsolationConfig};
pub use load::{load_config, ConfigOptions, LoadedConfig};
pub use preset::{get_preset, list_presets, PresetError, PresetInfo, PresetName};
pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_detection, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
