//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```toml
//! [device]
//! name = "event0"
//! retry_interval_ms = 5000
//! channel_capacity = 256
//!
//! [output]
//! format = "json"
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::codes::CodeTables;
use crate::device::ConnectionOptions;
use crate::error::{InputEventError, Result};
use crate::event::EventLayout;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Device connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Event output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
}

/// How the CLI prints events
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Human-readable line per event
    Text,
}

// Default value functions
fn default_device_name() -> String { "event0".to_string() }
fn default_retry_interval_ms() -> u64 { 5000 }
fn default_channel_capacity() -> usize { 256 }
fn default_output_format() -> OutputFormat { OutputFormat::Json }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            retry_interval_ms: default_retry_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use input_event::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.device.name.trim().is_empty() {
            return Err(InputEventError::Config(toml::de::Error::custom(
                "device name cannot be empty",
            )));
        }

        if self.device.retry_interval_ms == 0 || self.device.retry_interval_ms > 600_000 {
            return Err(InputEventError::Config(toml::de::Error::custom(
                "retry_interval_ms must be between 1 and 600000",
            )));
        }

        if self.device.channel_capacity == 0 || self.device.channel_capacity > 65_536 {
            return Err(InputEventError::Config(toml::de::Error::custom(
                "channel_capacity must be between 1 and 65536",
            )));
        }

        Ok(())
    }

    /// Connection options for the configured device
    pub fn connection_options(&self, tables: Arc<CodeTables>) -> ConnectionOptions {
        ConnectionOptions {
            retry_interval: Duration::from_millis(self.device.retry_interval_ms),
            channel_capacity: self.device.channel_capacity,
            layout: EventLayout::NATIVE,
            tables,
        }
    }
}
