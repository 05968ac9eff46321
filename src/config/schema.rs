//! Configuration schema types for `nosmooth.toml`
//!
//! Defines the structure and validation rules for nosmooth configuration.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::infer::DEFAULT_TOLERANCE;
use crate::orchestrator::Mode;

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Mode::Off => serializer.serialize_bool(false),
            Mode::Once => serializer.serialize_bool(true),
            Mode::Watch => serializer.serialize_str("watch"),
        }
    }
}

impl<'de> Deserialize<'de> for Mode {
    /// Accepts `true`, `false` or a string (`"true"`, `"false"`, `"watch"`).
    /// Unrecognized strings select the default mode.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ModeValue {
            Flag(bool),
            Name(String),
        }

        Ok(match ModeValue::deserialize(deserializer)? {
            ModeValue::Flag(false) => Mode::Off,
            ModeValue::Flag(true) => Mode::Once,
            ModeValue::Name(name) => Mode::parse(&name),
        })
    }
}

/// Scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Document-level mode: `false`, `true` or `"watch"`
    #[serde(default)]
    pub mode: Mode,
    /// Native-size tolerance in pixels
    #[serde(default = "default_tolerance")]
    pub tolerance: u32,
    /// Glob patterns of image sources that are never scaled
    #[serde(default)]
    pub skip: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { mode: Mode::default(), tolerance: default_tolerance(), skip: Vec::new() }
    }
}

fn default_tolerance() -> u32 {
    DEFAULT_TOLERANCE
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Poll interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u32,
    /// Use filesystem notifications instead of polling
    #[serde(default)]
    pub notify: bool,
    /// Debounce delay for filesystem notifications in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rescans
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_interval_ms() -> u32 {
    800
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            notify: false,
            debounce_ms: default_debounce_ms(),
            clear_screen: false,
        }
    }
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms as u64)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms as u64)
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving scaled images
    #[serde(default = "default_out_dir")]
    pub dir: PathBuf,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("nosmooth-out")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_out_dir() }
    }
}

/// Complete nosmooth.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NosmoothConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "watch.interval_ms")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "nosmooth.toml: '{}' {}", self.field, self.message)
    }
}

impl NosmoothConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.watch.interval_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.interval_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        for (i, pattern) in self.scan.skip.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ConfigValidationError {
                    field: format!("scan.skip[{}]", i),
                    message: format!("is not a valid glob pattern: {}", e),
                });
            }
        }

        if self.output.dir.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "output.dir".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
