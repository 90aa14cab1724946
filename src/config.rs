//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, and whole sections may be omitted:
//!
//! ```toml
//! [engine]
//! buffer_capacity = 10000
//! tick_interval_ms = 100
//! stats_window_ms = 5000
//! sample_cap = 1000
//! seed = 42
//!
//! [output]
//! drain_interval_ms = 500
//! batch_size = 1000
//! stats_interval_ms = 1000
//! format = "jsonl"
//! run_for_secs = 10
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::output::OutputFormat;
use crate::telemetry::{DEFAULT_BUFFER_CAPACITY, DEFAULT_SAMPLE_CAP, DEFAULT_STATS_WINDOW_MS};

/// Default worker tick interval (10 Hz)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Largest accepted ring buffer
const MAX_BUFFER_CAPACITY: usize = 1_000_000;

/// Longest accepted statistics window (one hour)
const MAX_STATS_WINDOW_MS: u64 = 3_600_000;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Telemetry engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_stats_window_ms")]
    pub stats_window_ms: u64,

    #[serde(default = "default_sample_cap")]
    pub sample_cap: usize,

    /// Noise seed; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Runner output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,

    #[serde(default)]
    pub format: OutputFormat,

    /// Stop after this many seconds; run until Ctrl+C when absent
    #[serde(default)]
    pub run_for_secs: Option<u64>,
}

// Default value functions
fn default_buffer_capacity() -> usize { DEFAULT_BUFFER_CAPACITY }
fn default_tick_interval_ms() -> u64 { DEFAULT_TICK_INTERVAL_MS }
fn default_stats_window_ms() -> u64 { DEFAULT_STATS_WINDOW_MS as u64 }
fn default_sample_cap() -> usize { DEFAULT_SAMPLE_CAP }

fn default_drain_interval_ms() -> u64 { 500 }
fn default_batch_size() -> usize { 1000 }
fn default_stats_interval_ms() -> u64 { 1000 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            tick_interval_ms: default_tick_interval_ms(),
            stats_window_ms: default_stats_window_ms(),
            sample_cap: default_sample_cap(),
            seed: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: default_drain_interval_ms(),
            batch_size: default_batch_size(),
            stats_interval_ms: default_stats_interval_ms(),
            format: OutputFormat::default(),
            run_for_secs: None,
        }
    }
}

impl EngineConfig {
    /// Tick interval as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl OutputConfig {
    /// Batch size clamped to the `i32` range used by `read_batch`
    pub fn batch_size_i32(&self) -> i32 {
        i32::try_from(self.batch_size).unwrap_or(i32::MAX)
    }
}

fn invalid(msg: impl std::fmt::Display) -> EngineError {
    EngineError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
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
    /// use gcs_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
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
        let engine = &self.engine;
        let output = &self.output;

        if engine.buffer_capacity < 2 || engine.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(invalid(format!(
                "buffer_capacity must be between 2 and {}",
                MAX_BUFFER_CAPACITY
            )));
        }

        if engine.tick_interval_ms == 0 || engine.tick_interval_ms > 60000 {
            return Err(invalid("tick_interval_ms must be between 1 and 60000"));
        }

        if engine.stats_window_ms == 0 || engine.stats_window_ms > MAX_STATS_WINDOW_MS {
            return Err(invalid(format!(
                "stats_window_ms must be between 1 and {}",
                MAX_STATS_WINDOW_MS
            )));
        }

        if engine.sample_cap == 0 {
            return Err(invalid("sample_cap must be greater than 0"));
        }

        if output.drain_interval_ms == 0 || output.drain_interval_ms > 60000 {
            return Err(invalid("drain_interval_ms must be between 1 and 60000"));
        }

        if output.stats_interval_ms == 0 || output.stats_interval_ms > 60000 {
            return Err(invalid("stats_interval_ms must be between 1 and 60000"));
        }

        if output.batch_size == 0 || output.batch_size > engine.buffer_capacity {
            return Err(invalid("batch_size must be between 1 and buffer_capacity"));
        }

        if output.run_for_secs == Some(0) {
            return Err(invalid("run_for_secs must be greater than 0 when set"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_buffer_capacity(), 10000);
        assert_eq!(default_tick_interval_ms(), 100);
        assert_eq!(default_stats_window_ms(), 5000);
        assert_eq!(default_sample_cap(), 1000);
        assert_eq!(default_drain_interval_ms(), 500);
        assert_eq!(default_batch_size(), 1000);
        assert_eq!(default_stats_interval_ms(), 1000);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.engine.buffer_capacity, 10000);
        assert_eq!(config.engine.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.engine.seed, None);
        assert_eq!(config.output.format, OutputFormat::Jsonl);
        assert_eq!(config.output.run_for_secs, None);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
[engine]
seed = 42
tick_interval_ms = 50

[output]
format = "summary"
run_for_secs = 3
"#,
        )
        .unwrap();

        assert_eq!(config.engine.seed, Some(42));
        assert_eq!(config.engine.tick_interval_ms, 50);
        assert_eq!(config.engine.stats_window_ms, 5000);
        assert_eq!(config.output.format, OutputFormat::Summary);
        assert_eq!(config.output.run_for_secs, Some(3));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::parse("[engine\nseed = ");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[engine]
buffer_capacity = 500

[output]
batch_size = 100
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.engine.buffer_capacity, 500);
        assert_eq!(config.output.batch_size, 100);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/gcs-telemetry.toml");
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[test]
    fn test_buffer_capacity_too_small() {
        let mut config = Config::default();
        config.engine.buffer_capacity = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_capacity_too_large() {
        let mut config = Config::default();
        config.engine.buffer_capacity = 1_000_001;
        config.output.batch_size = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_zero() {
        let mut config = Config::default();
        config.engine.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_too_high() {
        let mut config = Config::default();
        config.engine.tick_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stats_window_zero() {
        let mut config = Config::default();
        config.engine.stats_window_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stats_window_too_high() {
        let mut config = Config::default();
        config.engine.stats_window_ms = 3_600_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_cap_zero() {
        let mut config = Config::default();
        config.engine.sample_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_drain_interval_zero() {
        let mut config = Config::default();
        config.output.drain_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stats_interval_too_high() {
        let mut config = Config::default();
        config.output.stats_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_size_larger_than_buffer() {
        let mut config = Config::default();
        config.engine.buffer_capacity = 100;
        config.output.batch_size = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_size_zero() {
        let mut config = Config::default();
        config.output.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_output_format() {
        let result = Config::parse("[output]\nformat = \"csv\"\n");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_valid_output_formats() {
        for (name, expected) in [("jsonl", OutputFormat::Jsonl), ("summary", OutputFormat::Summary)] {
            let config = Config::parse(&format!("[output]\nformat = \"{}\"\n", name)).unwrap();
            assert_eq!(config.output.format, expected, "Format {} should be valid", name);
        }
    }

    #[test]
    fn test_run_for_zero_seconds() {
        let mut config = Config::default();
        config.output.run_for_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_size_i32_clamps() {
        let mut output = OutputConfig::default();
        assert_eq!(output.batch_size_i32(), 1000);
        output.batch_size = usize::MAX;
        assert_eq!(output.batch_size_i32(), i32::MAX);
    }
}
