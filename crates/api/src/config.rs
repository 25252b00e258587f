//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tessera_core::{Error, Result};

/// Settings for a [`Store`](crate::Store) handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Requests not answered within this many milliseconds fail with `Timeout`
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Prefix of generated entity ids
    #[serde(default = "default_entity_id_prefix")]
    pub entity_id_prefix: String,
    /// Prefix of generated trait ids
    #[serde(default = "default_trait_id_prefix")]
    pub trait_id_prefix: String,
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_entity_id_prefix() -> String {
    "et".to_string()
}

fn default_trait_id_prefix() -> String {
    "tr".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            entity_id_prefix: default_entity_id_prefix(),
            trait_id_prefix: default_trait_id_prefix(),
        }
    }
}

impl ClientConfig {
    /// Parse from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse client config: {}", e)))?;
        if config.request_timeout_ms == 0 {
            return Err(Error::invalid_config("request_timeout_ms must be positive"));
        }
        Ok(config)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
