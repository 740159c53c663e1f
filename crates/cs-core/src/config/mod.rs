//! Configuration loading for cs-core commands.
//!
//! Thin layer over `cs-config`: resolution and validation live there; this
//! module converts its errors into `cs_common::Error` and logs provenance.

pub use cs_config::preset::{get_preset, list_presets, PresetError, PresetInfo, PresetName};
pub use cs_config::{
    ConfigOptions, ConfigOverrides, ConfigSnapshot, DetectionConfig, LoadedConfig,
    ValidationError,
};

use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Resolve, override and validate the detection configuration.
pub fn load(options: &ConfigOptions, ctx: &LogContext) -> cs_common::Result<LoadedConfig> {
    let loaded = cs_config::load_config(options)?;
    let snapshot = &loaded.snapshot;
    if snapshot.is_default() {
        log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no config file found, using built-in defaults"
        );
    } else {
        log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            source = snapshot.source.as_str(),
            path = snapshot.path.as_deref().unwrap_or("-"),
            preset = snapshot.preset.as_deref().unwrap_or("-"),
            overrides_applied = snapshot.overrides_applied
        );
    }
    Ok(loaded)
}

/// Parse `LOW,HIGH` percentile bounds, e.g. `1,99`.
pub fn parse_percentile_bounds(s: &str) -> Result<(f64, f64), String> {
    let (lo, hi) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LOW,HIGH, got '{}'", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid percentile '{}': {}", v.trim(), e))
    };
    Ok((parse(lo)?, parse(hi)?))
}

/// clap value parser for preset names.
pub fn parse_preset(s: &str) -> Result<PresetName, String> {
    s.parse::<PresetName>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn percentile_bounds() {
        assert_eq!(parse_percentile_bounds("1,99"), Ok((1.0, 99.0)));
        assert_eq!(parse_percentile_bounds(" 2.5 , 97.5 "), Ok((2.5, 97.5)));
        assert!(parse_percentile_bounds("99").is_err());
        assert!(parse_percentile_bounds("a,99").is_err());
    }

    #[test]
    fn preset_parser() {
        assert_eq!(parse_preset("strict"), Ok(PresetName::Strict));
        assert!(parse_preset("nope").unwrap_err().contains("Available"));
    }

    #[test]
    fn load_preset_with_override() {
        let ctx = LogContext::new("cs-test");
        let loaded = load(
            &ConfigOptions {
                preset: Some(PresetName::Standard),
                overrides: ConfigOverrides {
                    random_seed: Some(7),
                    ..Default::default()
                },
                ..Default::default()
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(loaded.config.random_seed, 7);
        assert!(loaded.snapshot.overrides_applied);
        assert_eq!(loaded.snapshot.preset.as_deref(), Some("standard"));
    }

    #[test]
    fn invalid_file_maps_to_config_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "consensus_threshold = 9").unwrap();
        let err = load(
            &ConfigOptions {
                config_path: Some(file.path().to_path_buf()),
                ..Default::default()
            },
            &LogContext::new("cs-test"),
        )
        .unwrap_err();
        assert!(matches!(err, cs_common::Error::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load(
            &ConfigOptions {
                config_path: Some("/nonexistent/claim_sentinel.toml".into()),
                ..Default::default()
            },
            &LogContext::new("cs-test"),
        )
        .unwrap_err();
        assert_eq!(err.code(), 10);
    }
}
