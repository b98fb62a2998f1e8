//! Field Module
//!
//! A cache handle bound to one fixed key. Useful when a component caches a
//! single value and should not be able to touch any other key.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::ttl::Ttl;

// == Field ==
/// Single-key view of a cache engine.
#[derive(Clone)]
pub struct Field {
    cache: Cache,
    name: String,
    /// Precomputed final key, prefix chain included
    fk: String,
}

impl Field {
    // == Constructor ==
    /// Creates a field directly on an engine.
    pub fn new(cache: Cache, name: impl Into<String>) -> Self {
        let name = name.into();
        let fk = cache.final_key(&name);
        Self { cache, name, fk }
    }

    pub(crate) fn with_final_key(cache: Cache, name: String, fk: String) -> Self {
        Self { cache, name, fk }
    }

    // == Accessors ==
    /// The field's name, as given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The final key passed to the backend.
    pub fn final_key(&self) -> &str {
        &self.fk
    }

    fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CacheError::KeyUnavailable);
        }
        Ok(())
    }

    // == Value Operations ==
    pub fn set<T: Serialize>(&self, value: &T, ttl: Ttl) -> Result<()> {
        self.check()?;
        self.cache.set_value_final(&self.fk, value, ttl)
    }

    pub fn update<T: Serialize>(&self, value: &T, ttl: Ttl) -> Result<()> {
        self.check()?;
        self.cache.update_value_final(&self.fk, value, ttl)
    }

    pub fn get<T: DeserializeOwned>(&self) -> Result<T> {
        self.check()?;
        self.cache.get_value_final(&self.fk)
    }

    pub fn del(&self) -> Result<()> {
        self.check()?;
        self.cache.del_final(&self.fk)
    }

    pub fn expire(&self, ttl: Ttl) -> Result<()> {
        self.check()?;
        self.cache.expire_final(&self.fk, ttl)
    }

    // == Counter Operations ==
    pub fn set_counter(&self, value: i64, ttl: Ttl) -> Result<()> {
        self.check()?;
        self.cache.set_counter_final(&self.fk, value, ttl)
    }

    pub fn get_counter(&self) -> Result<i64> {
        self.check()?;
        self.cache.get_counter_final(&self.fk)
    }

    pub fn incr_counter(&self, increment: i64, ttl: Ttl) -> Result<i64> {
        self.check()?;
        self.cache.incr_counter_final(&self.fk, increment, ttl)
    }

    pub fn del_counter(&self) -> Result<()> {
        self.check()?;
        self.cache.del_counter_final(&self.fk)
    }

    pub fn expire_counter(&self, ttl: Ttl) -> Result<()> {
        self.check()?;
        self.cache.expire_counter_final(&self.fk, ttl)
    }

    // == Load ==
    /// Load-or-compute for this field's key, with the same stampede
    /// protection as [`Cache::load`].
    pub fn load<T, F>(&self, ttl: Ttl, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        self.check()?;
        self.cache.load_final(&self.fk, ttl, |_| loader())
    }
}
