//! TOML-based configuration for the host process itself.
//!
//! This is distinct from the per-module settings table: it holds the few
//! knobs that belong to the host rather than to any module, read once at
//! startup from the platform-appropriate location:
//!
//! - Windows:  `%APPDATA%\ModKit\config.toml`
//! - Linux:    `~/.config/modkit/config.toml`
//! - macOS:    `~/Library/Application Support/ModKit/config.toml`
//!
//! Fields annotated with `#[serde(default = "...")]` fall back to their
//! default when absent, so the host works on first run (no file yet) and
//! when upgrading from an older file missing newer fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for host configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Host process configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Override for the per-module settings file location.  When absent the
    /// settings live next to this config file as `settings.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<PathBuf>,

    /// Grace period, in milliseconds, the host waits after a module's stop
    /// hook for its worker to tear down.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_stop_grace_ms() -> u64 {
    500
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            settings_file: None,
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl HostConfig {
    /// Resolves where the per-module settings table is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformConfigDir`] when no override is set
    /// and the platform config directory cannot be determined.
    pub fn settings_file_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.settings_file {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("settings.json")),
        }
    }

    /// The stop grace period as a [`Duration`].
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// Determines the platform-appropriate directory for host files.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory
/// cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the host config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`HostConfig`] from disk, returning defaults if the file does not
/// yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<HostConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads [`HostConfig`] from an explicit path.  See [`load_config`].
pub fn load_config_from(path: &Path) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: HostConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform location, creating the directory if
/// needed.  The host calls this on first run so the user has a file to
/// edit.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &HostConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, config)
}

/// Persists `config` to an explicit path.  See [`save_config`].
pub fn save_config_to(path: &Path, config: &HostConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the app folder.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ModKit"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("modkit"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ModKit")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.stop_grace_ms, 500);
        assert!(cfg.settings_file.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        // Arrange
        let mut cfg = HostConfig::default();
        cfg.log_level = "debug".to_string();
        cfg.stop_grace_ms = 250;
        cfg.settings_file = Some(PathBuf::from("/tmp/modkit/settings.json"));

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: HostConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: HostConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_deserialize_partial_toml_overrides_defaults() {
        let cfg: HostConfig = toml::from_str("stop_grace_ms = 100\n").expect("deserialize");
        assert_eq!(cfg.stop_grace_ms, 100);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_deserialize_invalid_toml_is_an_error() {
        let result: Result<HostConfig, toml::de::Error> = toml::from_str("[[[ not toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_file_path_honours_override() {
        let mut cfg = HostConfig::default();
        cfg.settings_file = Some(PathBuf::from("/custom/settings.json"));
        assert_eq!(
            cfg.settings_file_path().unwrap(),
            PathBuf::from("/custom/settings.json")
        );
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"));
        }
        // NoPlatformConfigDir (e.g. a stripped CI env) is also acceptable.
    }

    #[test]
    fn test_save_then_load_round_trips_through_disk() {
        // Arrange – a path whose parent directory does not exist yet
        let dir = std::env::temp_dir().join(format!("modkit_config_{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let mut cfg = HostConfig::default();
        cfg.log_level = "trace".to_string();
        cfg.stop_grace_ms = 125;

        // Act
        save_config_to(&path, &cfg).expect("save");
        let restored = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(restored, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_missing_path_yields_defaults() {
        let path = std::env::temp_dir().join("modkit_config_never_written.toml");
        let cfg = load_config_from(&path).expect("load");
        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_stop_grace_converts_to_duration() {
        let mut cfg = HostConfig::default();
        cfg.stop_grace_ms = 42;
        assert_eq!(cfg.stop_grace(), Duration::from_millis(42));
    }
}
