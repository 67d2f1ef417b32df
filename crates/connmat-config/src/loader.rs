//! Layered configuration loading.
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Global file `~/.connmat/config.toml`
//! 3. Circuit-local file `<root>/.connmat/config.toml`
//! 4. Programmatic [`ConfigOverrides`]
//!
//! A file layer only replaces the fields it sets to a non-default value;
//! everything else is inherited from the layers below it.

use crate::error::ConfigError;
use crate::{CircuitConfig, ConfigOverrides, ConnmatConfig, ExtractionConfig, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CONFIG_DIR: &str = ".connmat";
const CONFIG_FILE: &str = "config.toml";

/// Loads and merges configuration layers for a circuit root.
///
/// The global layer is read at most once per loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_dir: Option<PathBuf>,
    global: Option<ConnmatConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader whose global layer lives under the user's home directory.
    pub fn new() -> Self {
        Self {
            global_dir: dirs::home_dir().map(|home| home.join(CONFIG_DIR)),
            global: None,
        }
    }

    /// Loader with an explicit global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_dir: Some(global_dir.into()),
            global: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_dir.as_ref().map(|dir| dir.join(CONFIG_FILE))
    }

    pub fn local_config_path(&self, circuit_root: &Path) -> PathBuf {
        circuit_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Merge every layer for `circuit_root` and validate the result.
    pub fn load(
        &mut self,
        circuit_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ConnmatConfig, ConfigError> {
        let layers = [self.load_global()?, self.load_local(circuit_root)?];
        let mut config = layers
            .into_iter()
            .flatten()
            .fold(ConnmatConfig::default(), merge_configs);

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }

        config.validate()?;
        Ok(config)
    }

    /// The global layer alone, if a global file exists.
    pub fn load_global(&mut self) -> Result<Option<ConnmatConfig>, ConfigError> {
        if self.global.is_none() {
            self.global = match self.global_config_path() {
                Some(path) => read_layer(&path, "global")?,
                None => {
                    debug!("No home directory, global config skipped");
                    None
                }
            };
        }
        Ok(self.global.clone())
    }

    /// The local layer alone, if `<root>/.connmat/config.toml` exists.
    pub fn load_local(&self, circuit_root: &Path) -> Result<Option<ConnmatConfig>, ConfigError> {
        read_layer(&self.local_config_path(circuit_root), "local")
    }

    /// Write `config` as the local layer of `circuit_root`.
    pub fn save_local(&self, circuit_root: &Path, config: &ConnmatConfig) -> Result<(), ConfigError> {
        let path = self.local_config_path(circuit_root);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&path, content).map_err(|e| ConfigError::write_file(&path, e))?;
        debug!(path = %path.display(), "Saved local config");
        Ok(())
    }
}

fn read_layer(path: &Path, layer: &str) -> Result<Option<ConnmatConfig>, ConfigError> {
    if !path.exists() {
        trace!(layer, path = %path.display(), "Config file not found");
        return Ok(None);
    }

    debug!(layer, path = %path.display(), "Loading config");
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::parse_toml(path, e))
}

/// `overlay` unless it still holds the default, in which case `base`.
fn pick<T: PartialEq>(base: T, overlay: T, default: &T) -> T {
    if overlay != *default {
        overlay
    } else {
        base
    }
}

fn merge_configs(base: ConnmatConfig, overlay: ConnmatConfig) -> ConnmatConfig {
    ConnmatConfig {
        circuit: merge_circuit(base.circuit, overlay.circuit),
        extraction: merge_extraction(base.extraction, overlay.extraction),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_circuit(base: CircuitConfig, overlay: CircuitConfig) -> CircuitConfig {
    let default = CircuitConfig::default();
    let mut projections = base.projections;
    projections.extend(overlay.projections);

    CircuitConfig {
        connectome: pick(base.connectome, overlay.connectome, &default.connectome),
        node_count: overlay.node_count.or(base.node_count),
        projections,
    }
}

fn merge_extraction(base: ExtractionConfig, overlay: ExtractionConfig) -> ExtractionConfig {
    let default = ExtractionConfig::default();
    ExtractionConfig {
        chunk_size: pick(base.chunk_size, overlay.chunk_size, &default.chunk_size),
        strategy: pick(base.strategy, overlay.strategy, &default.strategy),
        parallelism: pick(base.parallelism, overlay.parallelism, &default.parallelism),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let default = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, &default.level),
        format: pick(base.format, overlay.format, &default.format),
    }
}
