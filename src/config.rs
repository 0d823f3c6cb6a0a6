//! Analysis configuration
//!
//! Values come from defaults, an optional TOML file, then CLI overrides.
//!
//! ```toml
//! cache_line_size = 128
//! progress_interval = 500000
//! ```

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default coherence granularity in bytes
pub const DEFAULT_CACHE_LINE_SIZE: u64 = 64;

/// Default number of trace lines between progress messages
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Tunables for one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Bytes per cache line; addresses are grouped by `address / cache_line_size`
    pub cache_line_size: u64,
    /// Emit a progress log every this many trace lines
    pub progress_interval: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the cache line size, validating the result
    pub fn with_cache_line_size(mut self, cache_line_size: u64) -> Result<Self, ConfigError> {
        self.cache_line_size = cache_line_size;
        self.validate()?;
        Ok(self)
    }

    /// Check that the values can drive an analysis
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cache_line_size.is_power_of_two() {
            return Err(ConfigError::InvalidCacheLineSize(self.cache_line_size));
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::ZeroProgressInterval);
        }
        Ok(())
    }
}
