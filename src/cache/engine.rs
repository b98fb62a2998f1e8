//! Cache Engine Module
//!
//! The façade combining a storage driver, a marshaler, a default TTL and a
//! static key prefix. Implements typed get/set/update/delete, counter
//! operations and the load-or-compute stampede protection protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::stats::{CacheStats, StatsSnapshot};
use crate::cache::{Collection, Field, Node};
use crate::config::CacheConfig;
use crate::driver::Driver;
use crate::error::{CacheError, Result};
use crate::locker::KeyLockRegistry;
use crate::marshaler::Marshaler;
use crate::registry::Registry;
use crate::ttl::Ttl;

// == Cache ==
/// A cache engine over a pluggable storage driver.
///
/// Clones share the driver, the keyed lock registry and the statistics, so
/// one engine can be handed to many threads cheaply. Every public keyed
/// operation validates the key first: an empty key fails with
/// [`CacheError::KeyUnavailable`] before any backend call.
#[derive(Clone)]
pub struct Cache {
    driver: Arc<dyn Driver>,
    marshaler: Marshaler,
    default_ttl: Option<Duration>,
    key_prefix: String,
    locker: Arc<KeyLockRegistry>,
    stats: Arc<CacheStats>,
}

impl Cache {
    // == Constructor ==
    /// Creates an engine over a driver with no key prefix and entries that
    /// never expire by default.
    pub fn new(driver: Arc<dyn Driver>, marshaler: Marshaler) -> Self {
        Self {
            driver,
            marshaler,
            default_ttl: None,
            key_prefix: String::new(),
            locker: Arc::new(KeyLockRegistry::new()),
            stats: Arc::new(CacheStats::new()),
        }
    }

    // == Open ==
    /// Builds an engine from a config, resolving the driver and marshaler
    /// through the registry.
    pub fn open(registry: &Registry, config: &CacheConfig) -> Result<Self> {
        let driver = registry.create_driver(&config.driver, config.config.clone())?;
        let marshaler = registry.marshaler(&config.marshaler)?;
        Ok(Self::new(driver, marshaler)
            .with_default_ttl(Ttl::from_secs(config.ttl_secs))
            .with_key_prefix(config.key_prefix.clone()))
    }

    // == Builders ==
    /// Sets the default TTL applied when an operation passes [`Ttl::Default`].
    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl.resolve(None);
        self
    }

    /// Sets the static prefix prepended to every caller key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    // == Accessors ==
    /// Default TTL for this engine; `None` means entries never expire.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// The final key actually passed to the backend driver: the configured
    /// static prefix followed by the caller key.
    pub fn final_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Point-in-time hit/miss statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // == Typed Operations ==
    /// Serializes a value and stores it under the key.
    ///
    /// Advisory backend errors (`EntryTooLarge`, `NotCacheable`) propagate
    /// unchanged; callers in group or load contexts treat them as "the
    /// write did not happen here", not as failures.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.set_value_final(&self.final_key(key), value, ttl)
    }

    /// Serializes a value and stores it only if the key already exists.
    /// Absence is a silent no-op, not an error.
    pub fn update<T: Serialize>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.update_value_final(&self.final_key(key), value, ttl)
    }

    /// Retrieves and deserializes a value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        check_key(key)?;
        self.get_value_final(&self.final_key(key))
    }

    /// Deletes a key. Deleting an absent key is not an error.
    pub fn del(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.driver.del(&self.final_key(key))
    }

    // == Byte Operations ==
    /// Stores raw bytes, bypassing the marshaler.
    pub fn set_bytes(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.set_bytes_final(&self.final_key(key), value, ttl)
    }

    /// Stores raw bytes only if the key already exists.
    pub fn update_bytes(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.update_bytes_final(&self.final_key(key), value, ttl)
    }

    /// Retrieves raw bytes.
    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        check_key(key)?;
        self.get_bytes_final(&self.final_key(key))
    }

    /// Retrieves multiple keys at once. Absent keys are omitted from the
    /// result map; the map is keyed by caller keys, not final keys.
    pub fn mget_bytes(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        for key in keys {
            check_key(key)?;
        }
        let finals: Vec<String> = keys.iter().map(|k| self.final_key(k)).collect();
        let data = self.driver.mget_bytes(&finals)?;
        let mut result = HashMap::with_capacity(data.len());
        for (key, fk) in keys.iter().zip(finals.iter()) {
            // Lookup, not removal: a duplicated caller key resolves every time.
            if let Some(value) = data.get(fk) {
                result.insert(key.clone(), value.clone());
            }
        }
        Ok(result)
    }

    /// Stores multiple key-value pairs at once.
    pub fn mset_bytes(&self, values: &HashMap<String, Vec<u8>>, ttl: Ttl) -> Result<()> {
        for key in values.keys() {
            check_key(key)?;
        }
        let prefixed: HashMap<String, Vec<u8>> = values
            .iter()
            .map(|(k, v)| (self.final_key(k), v.clone()))
            .collect();
        self.driver.mset_bytes(&prefixed, self.resolve_ttl(ttl))
    }

    // == Counter Operations ==
    /// Sets a counter. Counters live in their own namespace and never
    /// collide with byte values stored under the same key.
    pub fn set_counter(&self, key: &str, value: i64, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.driver
            .set_counter(&self.final_key(key), value, self.resolve_ttl(ttl))
    }

    /// Reads a counter.
    pub fn get_counter(&self, key: &str) -> Result<i64> {
        check_key(key)?;
        self.driver.get_counter(&self.final_key(key))
    }

    /// Atomically increments a counter, creating it with the increment as
    /// its initial value if absent. Returns the post-increment value.
    pub fn incr_counter(&self, key: &str, increment: i64, ttl: Ttl) -> Result<i64> {
        check_key(key)?;
        self.driver
            .incr_counter(&self.final_key(key), increment, self.resolve_ttl(ttl))
    }

    /// Deletes a counter. Deleting an absent counter is not an error.
    pub fn del_counter(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.driver.del_counter(&self.final_key(key))
    }

    /// Rewrites a counter's expiration. An absent counter is a no-op.
    pub fn expire_counter(&self, key: &str, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.driver
            .expire_counter(&self.final_key(key), self.resolve_ttl(ttl))
    }

    // == Expire ==
    /// Rewrites a value's expiration. An absent key is a no-op.
    pub fn expire(&self, key: &str, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.driver.expire(&self.final_key(key), self.resolve_ttl(ttl))
    }

    // == Load ==
    /// Gets a value, computing and caching it on a miss.
    ///
    /// The stampede protection protocol: on a miss the per-key lock for the
    /// final key is acquired, the cache is re-checked under the lock, and
    /// only then is `loader` invoked. For N concurrent calls on the same
    /// missing key the loader runs at most once; every caller observes its
    /// result. Loader errors propagate verbatim and nothing is cached.
    ///
    /// A loader that blocks forever blocks all `load` callers for that key.
    pub fn load<T, F>(&self, key: &str, ttl: Ttl, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> Result<T>,
    {
        check_key(key)?;
        self.load_final(&self.final_key(key), ttl, |_| loader(key))
    }

    // == Flush ==
    /// Removes every entry in the backend.
    pub fn flush(&self) -> Result<()> {
        self.driver.flush()
    }

    // == Close ==
    /// Releases backend resources.
    pub fn close(&self) -> Result<()> {
        self.driver.close()
    }

    // == Namespacing ==
    /// Returns a node wrapping this engine under a key prefix.
    pub fn node(&self, prefix: impl Into<String>) -> Node {
        Node::new(self.clone(), prefix)
    }

    /// Returns a collection: a prefixed sub-cache with its own default TTL.
    pub fn collection(&self, prefix: impl Into<String>, ttl: Ttl) -> Collection {
        Collection::new(self.clone(), prefix, ttl)
    }

    /// Returns a field bound to one fixed key.
    pub fn field(&self, name: impl Into<String>) -> Field {
        Field::new(self.clone(), name)
    }

    // == Internal: final-key operations ==
    // The namespacing wrappers compute their own final keys and enter here,
    // so a wrapper's prefix lands outside the engine prefix exactly once.

    pub(crate) fn resolve_ttl(&self, ttl: Ttl) -> Option<Duration> {
        ttl.resolve(self.default_ttl)
    }

    pub(crate) fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        self.marshaler.marshal(value)
    }

    pub(crate) fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        self.marshaler.unmarshal(bytes)
    }

    pub(crate) fn set_value_final<T: Serialize>(&self, fk: &str, value: &T, ttl: Ttl) -> Result<()> {
        let bytes = self.marshal(value)?;
        self.set_bytes_final(fk, &bytes, ttl)
    }

    pub(crate) fn update_value_final<T: Serialize>(
        &self,
        fk: &str,
        value: &T,
        ttl: Ttl,
    ) -> Result<()> {
        let bytes = self.marshal(value)?;
        self.update_bytes_final(fk, &bytes, ttl)
    }

    pub(crate) fn get_value_final<T: DeserializeOwned>(&self, fk: &str) -> Result<T> {
        let bytes = self.get_bytes_final(fk)?;
        self.unmarshal(&bytes)
    }

    pub(crate) fn set_bytes_final(&self, fk: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        self.driver.set_bytes(fk, value, self.resolve_ttl(ttl))
    }

    pub(crate) fn update_bytes_final(&self, fk: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        self.driver.update_bytes(fk, value, self.resolve_ttl(ttl))
    }

    pub(crate) fn get_bytes_final(&self, fk: &str) -> Result<Vec<u8>> {
        match self.driver.get_bytes(fk) {
            Ok(bytes) => {
                self.stats.record_hit();
                Ok(bytes)
            }
            Err(e) => {
                if e.is_not_found() {
                    self.stats.record_miss();
                }
                Err(e)
            }
        }
    }

    pub(crate) fn del_final(&self, fk: &str) -> Result<()> {
        self.driver.del(fk)
    }

    pub(crate) fn set_counter_final(&self, fk: &str, value: i64, ttl: Ttl) -> Result<()> {
        self.driver.set_counter(fk, value, self.resolve_ttl(ttl))
    }

    pub(crate) fn get_counter_final(&self, fk: &str) -> Result<i64> {
        self.driver.get_counter(fk)
    }

    pub(crate) fn incr_counter_final(&self, fk: &str, increment: i64, ttl: Ttl) -> Result<i64> {
        self.driver.incr_counter(fk, increment, self.resolve_ttl(ttl))
    }

    pub(crate) fn del_counter_final(&self, fk: &str) -> Result<()> {
        self.driver.del_counter(fk)
    }

    pub(crate) fn expire_final(&self, fk: &str, ttl: Ttl) -> Result<()> {
        self.driver.expire(fk, self.resolve_ttl(ttl))
    }

    pub(crate) fn expire_counter_final(&self, fk: &str, ttl: Ttl) -> Result<()> {
        self.driver.expire_counter(fk, self.resolve_ttl(ttl))
    }

    pub(crate) fn mget_bytes_final(&self, finals: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        self.driver.mget_bytes(finals)
    }

    pub(crate) fn mset_bytes_final(
        &self,
        values: &HashMap<String, Vec<u8>>,
        ttl: Ttl,
    ) -> Result<()> {
        self.driver.mset_bytes(values, self.resolve_ttl(ttl))
    }

    pub(crate) fn load_final<T, F>(&self, fk: &str, ttl: Ttl, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> Result<T>,
    {
        // Fast path: already cached.
        match self.get_bytes_final(fk) {
            Ok(bytes) => return self.unmarshal(&bytes),
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => {}
        }

        let _guard = self.locker.lock(fk);

        // Another waiter may have populated the key while we blocked.
        match self.get_bytes_final(fk) {
            Ok(bytes) => return self.unmarshal(&bytes),
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => {}
        }

        let value = loader(fk)?;
        let bytes = self.marshal(&value)?;
        match self.set_bytes_final(fk, &bytes, ttl) {
            Ok(()) => {}
            Err(e) if e.is_advisory() => {
                // The backend declined the entry; the computed value is
                // still valid for this caller.
                debug!(key = fk, error = %e, "backend declined cached entry");
            }
            Err(e) => return Err(e),
        }
        Ok(value)
    }
}

// == Key Validation ==
/// Every keyed operation fails fast on an empty key, before any backend
/// mutation.
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::KeyUnavailable);
    }
    Ok(())
}
