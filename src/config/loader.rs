//! Configuration loading and discovery for `nosmooth.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::NosmoothConfig;
use crate::orchestrator::{Mode, Options};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "nosmooth.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse nosmooth.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the document-level mode
    pub mode: Option<Mode>,
    /// Override native-size tolerance
    pub tolerance: Option<u32>,
    /// Override poll interval
    pub interval_ms: Option<u32>,
    /// Use filesystem notifications
    pub notify: Option<bool>,
    /// Override output directory
    pub out: Option<PathBuf>,
}

/// Find nosmooth.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for nosmooth.toml
/// 2. Check XDG_CONFIG_HOME/nosmooth/nosmooth.toml (or ~/.config/nosmooth/nosmooth.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find nosmooth.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("nosmooth").join(CONFIG_FILE);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find nosmooth.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a nosmooth.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the
/// default configuration.
pub fn load_config(path: Option<&Path>) -> Result<NosmoothConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(NosmoothConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<NosmoothConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: NosmoothConfig = toml::from_str(&contents)?;
    check(&config)?;
    Ok(config)
}

fn check(config: &NosmoothConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(())
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut NosmoothConfig, overrides: &CliOverrides) {
    if let Some(mode) = overrides.mode {
        config.scan.mode = mode;
    }

    if let Some(tolerance) = overrides.tolerance {
        config.scan.tolerance = tolerance;
    }

    if let Some(interval_ms) = overrides.interval_ms {
        config.watch.interval_ms = interval_ms;
    }

    if let Some(notify) = overrides.notify {
        config.watch.notify = notify;
    }

    if let Some(ref out) = overrides.out {
        config.output.dir = out.clone();
    }
}

/// Build orchestrator options from a configuration.
///
/// Skip patterns are matched against image sources.
pub fn build_options(config: &NosmoothConfig) -> Result<Options, ConfigError> {
    check(config)?;

    let mut options = Options::default()
        .with_tolerance(config.scan.tolerance)
        .with_watch_interval(config.watch.interval());

    let patterns = config
        .scan
        .skip
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect::<Vec<_>>();
    if !patterns.is_empty() {
        options = options.with_skip(move |source| patterns.iter().any(|p| p.matches(source)));
    }

    Ok(options)
}
