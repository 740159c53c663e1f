//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → `CLAIM_SENTINEL_CONFIG` → XDG config → defaults.

use std::path::{Path, PathBuf};

/// Where the detection config was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in the XDG config directory.
    XdgConfig,

    /// Using built-in defaults (or a preset).
    #[default]
    BuiltinDefault,
}

impl ConfigSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSource::CliArgument => "cli",
            ConfigSource::Environment => "env",
            ConfigSource::XdgConfig => "xdg",
            ConfigSource::BuiltinDefault => "default",
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// A resolved config location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPath {
    /// Path to the config file (None when using defaults).
    pub path: Option<PathBuf>,

    /// How the path was found.
    pub source: ConfigSource,
}

/// Environment variable naming a config file or a directory holding one.
pub const ENV_CONFIG: &str = "CLAIM_SENTINEL_CONFIG";

/// Standard config file names, in lookup order.
const CONFIG_FILENAMES: [&str; 2] = ["detection.toml", "detection.json"];

/// Application name for XDG directories.
const APP_NAME: &str = "claim_sentinel";

/// Resolve the detection config path using the process environment.
///
/// Resolution order:
/// 1. Explicit CLI path (returned even if missing, so loading fails loudly)
/// 2. `CLAIM_SENTINEL_CONFIG`: a file, or a directory with `detection.toml`/`.json`
/// 3. `$XDG_CONFIG_HOME/claim_sentinel/detection.toml` (or `.json`)
/// 4. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPath {
    resolve_config_with(cli_path, std::env::var(ENV_CONFIG).ok(), xdg_config_dir())
}

/// Resolution with explicit inputs instead of the process environment.
pub fn resolve_config_with(
    cli_path: Option<&Path>,
    env_value: Option<String>,
    xdg_dir: Option<PathBuf>,
) -> ConfigPath {
    // 1. CLI argument
    if let Some(path) = cli_path {
        return ConfigPath {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    // 2. Environment variable (file or directory)
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        let path = PathBuf::from(value);
        if path.is_file() {
            return ConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
        if let Some(found) = find_in_dir(&path) {
            return ConfigPath {
                path: Some(found),
                source: ConfigSource::Environment,
            };
        }
    }

    // 3. XDG config directory
    if let Some(found) = xdg_dir.as_deref().and_then(find_in_dir) {
        return ConfigPath {
            path: Some(found),
            source: ConfigSource::XdgConfig,
        };
    }

    // 4. Built-in default
    ConfigPath::default()
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Get the XDG config directory for claim_sentinel.
///
/// Honors `XDG_CONFIG_HOME` before the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|d| d.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(format!("{}", ConfigSource::Environment), "environment variable");
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(format!("{}", ConfigSource::BuiltinDefault), "builtin default");
        assert_eq!(ConfigSource::XdgConfig.as_str(), "xdg");
    }

    #[test]
    fn test_cli_wins_even_if_missing() {
        let resolved = resolve_config_with(
            Some(Path::new("/nonexistent/detection.toml")),
            Some("/tmp".to_string()),
            None,
        );
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(
            resolved.path,
            Some(PathBuf::from("/nonexistent/detection.toml"))
        );
    }

    #[test]
    fn test_env_directory_lookup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("detection.json"), "{}").unwrap();
        let resolved = resolve_config_with(
            None,
            Some(dir.path().to_string_lossy().to_string()),
            None,
        );
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.path, Some(dir.path().join("detection.json")));
    }

    #[test]
    fn test_toml_preferred_over_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("detection.json"), "{}").unwrap();
        fs::write(dir.path().join("detection.toml"), "").unwrap();
        let resolved = resolve_config_with(None, None, Some(dir.path().to_path_buf()));
        assert_eq!(resolved.source, ConfigSource::XdgConfig);
        assert_eq!(resolved.path, Some(dir.path().join("detection.toml")));
    }

    #[test]
    fn test_env_beats_xdg() {
        let env_dir = TempDir::new().unwrap();
        let xdg_dir = TempDir::new().unwrap();
        let env_file = env_dir.path().join("custom.toml");
        fs::write(&env_file, "").unwrap();
        fs::write(xdg_dir.path().join("detection.toml"), "").unwrap();
        let resolved = resolve_config_with(
            None,
            Some(env_file.to_string_lossy().to_string()),
            Some(xdg_dir.path().to_path_buf()),
        );
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.path, Some(env_file));
    }

    #[test]
    fn test_falls_back_to_default() {
        let empty = TempDir::new().unwrap();
        let resolved = resolve_config_with(
            None,
            Some(empty.path().join("missing").to_string_lossy().to_string()),
            Some(empty.path().to_path_buf()),
        );
        assert_eq!(resolved, ConfigPath::default());
    }
}
