//! Registry Module
//!
//! Name-to-factory lookup for drivers and marshalers.
//!
//! The registry is an explicit value owned by the application's composition
//! root rather than process-wide mutable state: construct one, register any
//! custom drivers, then hand it to [`crate::Cache::open`]. Lookups happen
//! once at construction time, never per call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::driver::Driver;
use crate::drivers::memory::MemoryCache;
use crate::error::{CacheError, Result};
use crate::group::GroupCache;
use crate::marshaler::Marshaler;

// == Driver Factory ==
/// Builds a driver from its opaque configuration payload.
///
/// Factories receive the registry so composite drivers (like "group") can
/// construct nested caches.
pub type DriverFactory =
    Box<dyn Fn(&Registry, serde_json::Value) -> Result<Arc<dyn Driver>> + Send + Sync>;

// == Registry ==
/// Driver and marshaler lookup table.
pub struct Registry {
    drivers: HashMap<String, DriverFactory>,
    marshalers: HashMap<String, Marshaler>,
}

impl Registry {
    // == Constructor ==
    /// Creates an empty registry with nothing registered.
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
            marshalers: HashMap::new(),
        }
    }

    /// Creates a registry with the standard entries: the "memory" and
    /// "group" drivers and the "bincode" and "json" marshalers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_driver("memory", Box::new(memory_factory));
        registry.register_driver("group", Box::new(group_factory));
        registry.register_marshaler("bincode", Marshaler::Bincode);
        registry.register_marshaler("json", Marshaler::Json);
        registry
    }

    // == Register Driver ==
    /// Makes a driver factory available under a name, replacing any
    /// previous registration.
    pub fn register_driver(&mut self, name: impl Into<String>, factory: DriverFactory) {
        self.drivers.insert(name.into(), factory);
    }

    // == Register Marshaler ==
    /// Makes a marshaler available under a name.
    pub fn register_marshaler(&mut self, name: impl Into<String>, marshaler: Marshaler) {
        self.marshalers.insert(name.into(), marshaler);
    }

    // == Create Driver ==
    /// Instantiates a driver by registered name.
    pub fn create_driver(&self, name: &str, config: serde_json::Value) -> Result<Arc<dyn Driver>> {
        let factory = self
            .drivers
            .get(name)
            .ok_or_else(|| CacheError::UnknownDriver(name.to_string()))?;
        factory(self, config)
    }

    // == Marshaler Lookup ==
    /// Resolves a marshaler by registered name.
    pub fn marshaler(&self, name: &str) -> Result<Marshaler> {
        self.marshalers
            .get(name)
            .copied()
            .ok_or_else(|| CacheError::UnknownMarshaler(name.to_string()))
    }

    // == Names ==
    /// Returns the sorted list of registered driver names.
    pub fn driver_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the sorted list of registered marshaler names.
    pub fn marshaler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.marshalers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// == Standard Factories ==
/// Factory for the in-memory driver.
fn memory_factory(_registry: &Registry, config: serde_json::Value) -> Result<Arc<dyn Driver>> {
    let config = if config.is_null() {
        Default::default()
    } else {
        serde_json::from_value(config).map_err(|e| CacheError::Codec(e.to_string()))?
    };
    Ok(Arc::new(MemoryCache::new(config)))
}

/// Factory for the group driver. The payload is a list of nested cache
/// configs ordered fastest tier first.
fn group_factory(registry: &Registry, config: serde_json::Value) -> Result<Arc<dyn Driver>> {
    let configs: Vec<CacheConfig> =
        serde_json::from_value(config).map_err(|e| CacheError::Codec(e.to_string()))?;
    let tiers = configs
        .iter()
        .map(|c| Cache::open(registry, c))
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(GroupCache::new(tiers)))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.driver_names(), vec!["group", "memory"]);
        assert_eq!(registry.marshaler_names(), vec!["bincode", "json"]);
    }

    #[test]
    fn test_unknown_driver() {
        let registry = Registry::with_defaults();
        let result = registry.create_driver("redis", serde_json::Value::Null);
        assert!(matches!(result, Err(CacheError::UnknownDriver(_))));
    }

    #[test]
    fn test_unknown_marshaler() {
        let registry = Registry::new();
        assert!(matches!(
            registry.marshaler("bincode"),
            Err(CacheError::UnknownMarshaler(_))
        ));
    }

    #[test]
    fn test_create_memory_driver_with_null_config() {
        let registry = Registry::with_defaults();
        let driver = registry.create_driver("memory", serde_json::Value::Null).unwrap();
        driver.set_bytes("k", b"v", None).unwrap();
        assert_eq!(driver.get_bytes("k").unwrap(), b"v");
    }
}
