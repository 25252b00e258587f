//! Engine configuration via `tessera.toml`
//!
//! Every field has a default, so an empty file (or no file, via
//! [`EngineConfig::default`]) yields a working engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::{Error, Result};

/// Config file name used by embedders that keep one next to their data.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Reference engine configuration.
///
/// # Example
///
/// ```toml
/// default_page_size = 10
/// max_page_size = 1000
/// notify_unchanged = false
/// watch_channel_capacity = 64
/// auto_commit = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Page size used when a query asks for `count = 0`.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Upper bound on any page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Push a summary page to watchers even when re-evaluation finds the same hash.
    #[serde(default)]
    pub notify_unchanged: bool,
    /// Buffered result pages per watch before the watch fails as lagging.
    #[serde(default = "default_watch_channel_capacity")]
    pub watch_channel_capacity: usize,
    /// Treat every applied mutation as durable immediately (results report `Chain`).
    #[serde(default)]
    pub auto_commit: bool,
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    1000
}

fn default_watch_channel_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            notify_unchanged: false,
            watch_channel_capacity: default_watch_channel_capacity(),
            auto_commit: false,
        }
    }
}

impl EngineConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the page sizes are zero or inverted, or the
    /// watch channel cannot hold a result plus a terminal error.
    pub fn validate(&self) -> Result<()> {
        if self.default_page_size == 0 {
            return Err(Error::invalid_config("default_page_size must be positive"));
        }
        if self.max_page_size < self.default_page_size {
            return Err(Error::invalid_config(format!(
                "max_page_size ({}) is smaller than default_page_size ({})",
                self.max_page_size, self.default_page_size
            )));
        }
        if self.watch_channel_capacity < 2 {
            return Err(Error::invalid_config(
                "watch_channel_capacity must be at least 2",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tessera engine configuration
#
# Page size for queries that do not request one (count = 0)
default_page_size = 10

# Largest page any query can receive
max_page_size = 1000

# Push summary pages to live queries even when results did not change
notify_unchanged = false

# Result pages buffered per live query before it fails as lagging
watch_channel_capacity = 64

# Report applied mutations as durable (Chain) immediately
auto_commit = false
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::invalid_config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
