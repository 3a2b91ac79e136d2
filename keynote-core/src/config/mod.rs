pub mod types;

pub use types::*;

use crate::core::ConfigurationError;
use anyhow::{Context, Result};
use std::path::Path;

impl ServiceConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ServiceConfig =
            serde_json::from_str(json).context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Build from an already-parsed JSON value
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let config: ServiceConfig =
            serde_json::from_value(value).context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        let raw = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration {}", config_path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Resolve the Redis URI registered under `key`
    pub fn uri_for(&self, key: &str) -> Result<&str, ConfigurationError> {
        self.redis_uris
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigurationError::UnknownUriKey(key.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_backoff_factor(self.redis.pubsub_backoff_factor)
    }
}

pub(crate) fn validate_backoff_factor(factor: f64) -> Result<(), ConfigurationError> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(ConfigurationError::InvalidBackoffFactor(factor));
    }
    Ok(())
}
