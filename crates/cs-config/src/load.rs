//! Loading the effective detection configuration.

use std::path::PathBuf;

use crate::detection::{ConfigOverrides, DetectionConfig};
use crate::preset::{get_preset, PresetName};
use crate::resolve::{resolve_config, ConfigPath, ConfigSource};
use crate::snapshot::ConfigSnapshot;
use crate::validate::{validate_detection, ValidationError, ValidationResult};

/// Configuration resolution options.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Explicit config file path (highest priority).
    pub config_path: Option<PathBuf>,

    /// Start from a named preset instead of discovering a file.
    pub preset: Option<PresetName>,

    /// Individual values applied last.
    pub overrides: ConfigOverrides,
}

/// Validated configuration with provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DetectionConfig,
    pub snapshot: ConfigSnapshot,
}

/// Load configuration with the standard resolution order.
///
/// An explicit preset takes the place of file discovery; an explicit path
/// must exist. Overrides are applied before validation, so an override can
/// neither bypass nor be bypassed by the semantic checks.
pub fn load_config(options: &ConfigOptions) -> ValidationResult<LoadedConfig> {
    let (mut config, location, content) = match (options.preset, &options.config_path) {
        (Some(_), Some(_)) => {
            return Err(ValidationError::SemanticError(
                "a preset and a config file cannot be combined".to_string(),
            ))
        }
        (Some(preset), None) => (get_preset(preset), ConfigPath::default(), None),
        (None, explicit) => load_resolved(resolve_config(explicit.as_deref()))?,
    };

    let before = config.clone();
    options.overrides.apply(&mut config);
    let overrides_applied = config != before;

    validate_detection(&config)?;

    let snapshot = ConfigSnapshot::new(
        &config,
        &location,
        options.preset.map(|p| p.as_str()),
        content.as_deref(),
        overrides_applied,
    );
    Ok(LoadedConfig { config, snapshot })
}

fn load_resolved(
    location: ConfigPath,
) -> ValidationResult<(DetectionConfig, ConfigPath, Option<String>)> {
    match &location.path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ValidationError::IoError(format!("{}: {}", path.display(), e))
            })?;
            let config = DetectionConfig::from_str_for_path(&content, path)?;
            Ok((config, location, Some(content)))
        }
        None => {
            debug_assert_eq!(location.source, ConfigSource::BuiltinDefault);
            Ok((DetectionConfig::default(), location, None))
        }
    }
}
