//! connmat Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.connmat/config.toml`
//! - Local config: `.connmat/config.toml` (next to the circuit)
//! - Programmatic overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name under which the circuit's own (intrinsic) connectome is addressed.
pub const LOCAL_CONNECTOME: &str = "local";

/// Default number of edge rows read per chunk during full scans.
pub const DEFAULT_CHUNK_SIZE: u64 = 50_000_000;

/// Log levels accepted by `LoggingConfig::level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration for connmat.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ConnmatConfig {
    /// Where the circuit's edge stores live
    pub circuit: CircuitConfig,

    /// Matrix extraction settings
    pub extraction: ExtractionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Circuit configuration: edge store locations and node count.
///
/// # Example TOML
///
/// ```toml
/// [circuit]
/// connectome = "edges.db"
/// node_count = 31346
///
/// [circuit.projections]
/// thalamic = "proj_thalamic.db"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircuitConfig {
    /// Edge store of the local connectome
    pub connectome: PathBuf,

    /// Authoritative node count (None = use the local store's declared count)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u64>,

    /// Named projection edge stores
    pub projections: HashMap<String, PathBuf>,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            connectome: PathBuf::from("edges.db"),
            node_count: None,
            projections: HashMap::new(),
        }
    }
}

impl CircuitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.connectome.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "circuit.connectome must not be empty".to_string(),
            ));
        }
        if self.projections.contains_key(LOCAL_CONNECTOME) {
            return Err(ConfigError::invalid_value(
                "circuit.projections",
                format!("'{}' is reserved for the local connectome", LOCAL_CONNECTOME),
            ));
        }
        for (name, path) in &self.projections {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("circuit.projections.{}", name),
                    "path must not be empty",
                ));
            }
        }
        if self.node_count == Some(0) {
            return Err(ConfigError::invalid_value(
                "circuit.node_count",
                "must be positive when set",
            ));
        }
        Ok(())
    }
}

/// Strategy used for per-group matrices and group aggregation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// Targeted index lookups; cost scales with afferent degree (default)
    #[default]
    Indexed,
    /// One streaming scan of the whole store; cost scales with edge count
    Full,
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Indexed => write!(f, "indexed"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for ExtractionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "indexed" | "partial" => Ok(Self::Indexed),
            "full" | "partition" => Ok(Self::Full),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown extraction strategy: '{}'. Valid values: indexed, full",
                s
            ))),
        }
    }
}

/// Matrix extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Edge rows per chunk during full scans
    pub chunk_size: u64,

    /// Strategy for group matrices and group aggregation
    pub strategy: ExtractionStrategy,

    /// Worker threads for indexed aggregation (1 = sequential, 0 = rayon default)
    pub parallelism: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            strategy: ExtractionStrategy::default(),
            parallelism: 1,
        }
    }
}

impl ExtractionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid_value(
                "extraction.chunk_size",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}', expected one of {}",
                    self.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// Programmatic overrides for configuration values.
///
/// Applied last, over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the local connectome path
    pub connectome: Option<PathBuf>,

    /// Override the authoritative node count
    pub node_count: Option<u64>,

    /// Override chunk size
    pub chunk_size: Option<u64>,

    /// Override extraction strategy
    pub strategy: Option<ExtractionStrategy>,

    /// Override parallelism
    pub parallelism: Option<usize>,

    /// Override log level
    pub log_level: Option<String>,

    /// Override log output format
    pub log_format: Option<LogFormat>,
}

impl ConnmatConfig {
    /// Apply overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref path) = overrides.connectome {
            self.circuit.connectome = path.clone();
        }

        if let Some(count) = overrides.node_count {
            self.circuit.node_count = Some(count);
        }

        if let Some(chunk_size) = overrides.chunk_size {
            self.extraction.chunk_size = chunk_size;
        }

        if let Some(strategy) = overrides.strategy {
            self.extraction.strategy = strategy;
        }

        if let Some(parallelism) = overrides.parallelism {
            self.extraction.parallelism = parallelism;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }

        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.circuit.validate()?;
        self.extraction.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Resolve a configured path against the circuit root.
    pub fn resolve_path(&self, root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    /// Get the local connectome store path for a circuit root.
    pub fn connectome_path(&self, root: &Path) -> PathBuf {
        self.resolve_path(root, &self.circuit.connectome)
    }

    /// Get a projection store path for a circuit root, if configured.
    pub fn projection_path(&self, root: &Path, name: &str) -> Option<PathBuf> {
        self.circuit
            .projections
            .get(name)
            .map(|p| self.resolve_path(root, p))
    }
}
