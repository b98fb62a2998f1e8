//! Node Module
//!
//! A zero-logic key-prefixing decorator over a cache engine. A node gives
//! callers an isolated key subspace without a new backend: every operation
//! recomputes the final key as `prefix + separator + engine final key` and
//! delegates unchanged otherwise.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{Cache, Collection, Field, KEY_SEPARATOR};
use crate::error::{CacheError, Result};
use crate::ttl::Ttl;

// == Node ==
/// Prefixed view of a cache engine.
///
/// Nodes nest: `node.node("inner")` extends the prefix chain on the same
/// underlying engine rather than stacking decorators.
#[derive(Clone)]
pub struct Node {
    cache: Cache,
    /// Accumulated prefix chain, separator included
    chain: String,
}

impl Node {
    // == Constructor ==
    /// Creates a node over an engine with the given prefix.
    pub fn new(cache: Cache, prefix: impl Into<String>) -> Self {
        let chain = format!("{}{}", prefix.into(), KEY_SEPARATOR);
        Self { cache, chain }
    }

    fn with_chain(cache: Cache, chain: String) -> Self {
        Self { cache, chain }
    }

    // == Final Key ==
    /// The final key passed to the backend: this node's prefix chain, then
    /// the engine's static prefix, then the caller key.
    pub fn final_key(&self, key: &str) -> String {
        format!("{}{}", self.chain, self.cache.final_key(key))
    }

    /// Default TTL of the underlying engine.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.cache.default_ttl()
    }

    // == Typed Operations ==
    /// Serializes a value and stores it under the prefixed key.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.cache.set_value_final(&self.final_key(key), value, ttl)
    }

    /// Stores a value only if the prefixed key already exists.
    pub fn update<T: Serialize>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.cache.update_value_final(&self.final_key(key), value, ttl)
    }

    /// Retrieves and deserializes a value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        check_key(key)?;
        self.cache.get_value_final(&self.final_key(key))
    }

    /// Deletes the prefixed key. Absence is not an error.
    pub fn del(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.cache.del_final(&self.final_key(key))
    }

    // == Byte Operations ==
    pub fn set_bytes(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.cache.set_bytes_final(&self.final_key(key), value, ttl)
    }

    pub fn update_bytes(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.cache.update_bytes_final(&self.final_key(key), value, ttl)
    }

    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        check_key(key)?;
        self.cache.get_bytes_final(&self.final_key(key))
    }

    /// Batch read. The result map is keyed by caller keys, with the prefix
    /// chain stripped; absent keys are omitted.
    pub fn mget_bytes(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        for key in keys {
            check_key(key)?;
        }
        let finals: Vec<String> = keys.iter().map(|k| self.final_key(k)).collect();
        let data = self.cache.mget_bytes_final(&finals)?;
        let mut result = HashMap::with_capacity(data.len());
        for (key, fk) in keys.iter().zip(finals.iter()) {
            // Lookup, not removal: a duplicated caller key resolves every time.
            if let Some(value) = data.get(fk) {
                result.insert(key.clone(), value.clone());
            }
        }
        Ok(result)
    }

    /// Batch write under the prefix chain.
    pub fn mset_bytes(&self, values: &HashMap<String, Vec<u8>>, ttl: Ttl) -> Result<()> {
        for key in values.keys() {
            check_key(key)?;
        }
        let prefixed: HashMap<String, Vec<u8>> = values
            .iter()
            .map(|(k, v)| (self.final_key(k), v.clone()))
            .collect();
        self.cache.mset_bytes_final(&prefixed, ttl)
    }

    // == Counter Operations ==
    pub fn set_counter(&self, key: &str, value: i64, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.cache.set_counter_final(&self.final_key(key), value, ttl)
    }

    pub fn get_counter(&self, key: &str) -> Result<i64> {
        check_key(key)?;
        self.cache.get_counter_final(&self.final_key(key))
    }

    pub fn incr_counter(&self, key: &str, increment: i64, ttl: Ttl) -> Result<i64> {
        check_key(key)?;
        self.cache
            .incr_counter_final(&self.final_key(key), increment, ttl)
    }

    pub fn del_counter(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.cache.del_counter_final(&self.final_key(key))
    }

    pub fn expire_counter(&self, key: &str, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.cache.expire_counter_final(&self.final_key(key), ttl)
    }

    // == Expire ==
    pub fn expire(&self, key: &str, ttl: Ttl) -> Result<()> {
        check_key(key)?;
        self.cache.expire_final(&self.final_key(key), ttl)
    }

    // == Load ==
    /// Load-or-compute under the prefixed key. The loader still receives
    /// the caller key, not the prefixed one.
    pub fn load<T, F>(&self, key: &str, ttl: Ttl, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> Result<T>,
    {
        check_key(key)?;
        self.cache
            .load_final(&self.final_key(key), ttl, |_| loader(key))
    }

    // == Flush ==
    /// Not supported: no backend can flush a key subspace selectively, and
    /// flushing the whole backend from a namespace would be surprising.
    pub fn flush(&self) -> Result<()> {
        Err(CacheError::FeatureNotSupported("flush on a cache node"))
    }

    // == Close ==
    /// Closing a node is a no-op; the engine owns the backend.
    pub fn close(&self) -> Result<()> {
        Ok(())
    }

    // == Namespacing ==
    /// Extends the prefix chain with another level.
    pub fn node(&self, prefix: impl Into<String>) -> Node {
        let chain = format!("{}{}{}", self.chain, prefix.into(), KEY_SEPARATOR);
        Node::with_chain(self.cache.clone(), chain)
    }

    /// Returns a collection nested under this node.
    pub fn collection(&self, prefix: impl Into<String>, ttl: Ttl) -> Collection {
        Collection::from_node(self.node(prefix), ttl)
    }

    /// Returns a field bound to one key inside this node.
    pub fn field(&self, name: impl Into<String>) -> Field {
        let name = name.into();
        let fk = self.final_key(&name);
        Field::with_final_key(self.cache.clone(), name, fk)
    }
}

// == Key Validation ==
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::KeyUnavailable);
    }
    Ok(())
}
