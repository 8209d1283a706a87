//! Inspection tool configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via OPCWIRE_CONFIG or --config)
//! 3. Environment variables
//! 4. Command line flags (applied by `main`)

use opcwire_spi::{ByteOrder, CodecOptions, ReservedPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Options handed to every decode and encode.
    pub codec: CodecOptions,
    /// Output configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Loads configuration from `path` (or OPCWIRE_CONFIG), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var("OPCWIRE_CONFIG").ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Unparseable values are logged and
    /// ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(policy) = lookup("OPCWIRE_RESERVED_POLICY") {
            match policy.parse::<ReservedPolicy>() {
                Ok(policy) => self.codec.reserved_policy = policy,
                Err(e) => tracing::warn!("ignoring OPCWIRE_RESERVED_POLICY: {}", e),
            }
        }

        if let Some(order) = lookup("OPCWIRE_BYTE_ORDER") {
            match order.parse::<ByteOrder>() {
                Ok(order) => self.codec.byte_order = order,
                Err(e) => tracing::warn!("ignoring OPCWIRE_BYTE_ORDER: {}", e),
            }
        }

        if let Some(depth) = lookup("OPCWIRE_MAX_DEPTH") {
            match depth.parse::<usize>() {
                Ok(depth) => self.codec.max_depth = depth,
                Err(e) => tracing::warn!("ignoring OPCWIRE_MAX_DEPTH: {}", e),
            }
        }

        self.output.apply_overrides(lookup);
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// How decoded messages are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Indented labeled tree.
    #[default]
    Text,
    /// The labeled tree as JSON.
    Json,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Colorize terminal output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

impl OutputConfig {
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(format) = lookup("OPCWIRE_OUTPUT_FORMAT") {
            match format.to_lowercase().as_str() {
                "text" => self.format = OutputFormat::Text,
                "json" => self.format = OutputFormat::Json,
                other => tracing::warn!("ignoring OPCWIRE_OUTPUT_FORMAT: unknown format {}", other),
            }
        }

        if let Some(color) = lookup("OPCWIRE_COLOR") {
            self.color = color == "1" || color.to_lowercase() == "true";
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}
