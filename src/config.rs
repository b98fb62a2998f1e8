//! Configuration Module
//!
//! Describes how to assemble one cache engine: which driver, which
//! marshaler, the default TTL, the static key prefix and the opaque
//! driver-specific payload.

use serde::{Deserialize, Serialize};

// == Cache Config ==
/// Construction-time configuration for a [`crate::Cache`].
///
/// The `config` payload is opaque at this level; it is decoded by the
/// chosen driver. Group caches nest a list of these, one per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Registered driver name (e.g. "memory", "group")
    pub driver: String,
    /// Registered marshaler name (default: "bincode")
    pub marshaler: String,
    /// Default TTL in seconds; zero or negative means entries never expire
    pub ttl_secs: i64,
    /// Static prefix prepended to every caller key
    pub key_prefix: String,
    /// Driver-specific configuration payload
    pub config: serde_json::Value,
}

impl CacheConfig {
    // == Constructor ==
    /// Creates a config for the given driver with defaults everywhere else.
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Self::default()
        }
    }

    // == Builders ==
    /// Selects the marshaler by registered name.
    pub fn with_marshaler(mut self, name: impl Into<String>) -> Self {
        self.marshaler = name.into();
        self
    }

    /// Sets the default TTL in seconds; zero or negative means never expire.
    pub fn with_ttl_secs(mut self, secs: i64) -> Self {
        self.ttl_secs = secs;
        self
    }

    /// Sets the static key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the driver-specific payload.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            marshaler: "bincode".to_string(),
            ttl_secs: 0,
            key_prefix: String::new(),
            config: serde_json::Value::Null,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.driver, "memory");
        assert_eq!(config.marshaler, "bincode");
        assert_eq!(config.ttl_secs, 0);
        assert_eq!(config.key_prefix, "");
        assert!(config.config.is_null());
    }

    #[test]
    fn test_config_builders() {
        let config = CacheConfig::new("group")
            .with_marshaler("json")
            .with_ttl_secs(300)
            .with_key_prefix("app");
        assert_eq!(config.driver, "group");
        assert_eq!(config.marshaler, "json");
        assert_eq!(config.ttl_secs, 300);
        assert_eq!(config.key_prefix, "app");
    }

    #[test]
    fn test_config_deserializes_with_partial_fields() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"driver":"memory","ttl_secs":60}"#).unwrap();
        assert_eq!(config.driver, "memory");
        assert_eq!(config.ttl_secs, 60);
        assert_eq!(config.marshaler, "bincode");
    }
}
