//! Collection Module
//!
//! A prefixed sub-cache with its own default TTL. Identical to a node
//! except that operations passing [`Ttl::Default`] resolve against the
//! collection's TTL instead of the engine's.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{Cache, Field, Node};
use crate::error::{CacheError, Result};
use crate::ttl::Ttl;

// == Collection ==
#[derive(Clone)]
pub struct Collection {
    node: Node,
    default_ttl: Ttl,
}

impl Collection {
    // == Constructor ==
    /// Creates a collection over an engine with the given prefix and its
    /// own default TTL.
    pub fn new(cache: Cache, prefix: impl Into<String>, ttl: Ttl) -> Self {
        Self::from_node(Node::new(cache, prefix), ttl)
    }

    pub(crate) fn from_node(node: Node, ttl: Ttl) -> Self {
        Self {
            node,
            default_ttl: ttl,
        }
    }

    /// Resolves `Ttl::Default` against this collection's own TTL. If the
    /// collection itself was configured with `Ttl::Default`, the engine's
    /// default applies downstream.
    fn resolve(&self, ttl: Ttl) -> Ttl {
        match ttl {
            Ttl::Default => self.default_ttl,
            other => other,
        }
    }

    // == Final Key ==
    pub fn final_key(&self, key: &str) -> String {
        self.node.final_key(key)
    }

    /// This collection's default TTL.
    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    // == Typed Operations ==
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        self.node.set(key, value, self.resolve(ttl))
    }

    pub fn update<T: Serialize>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        self.node.update(key, value, self.resolve(ttl))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.node.get(key)
    }

    pub fn del(&self, key: &str) -> Result<()> {
        self.node.del(key)
    }

    // == Byte Operations ==
    pub fn set_bytes(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        self.node.set_bytes(key, value, self.resolve(ttl))
    }

    pub fn update_bytes(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<()> {
        self.node.update_bytes(key, value, self.resolve(ttl))
    }

    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.node.get_bytes(key)
    }

    // == Counter Operations ==
    pub fn set_counter(&self, key: &str, value: i64, ttl: Ttl) -> Result<()> {
        self.node.set_counter(key, value, self.resolve(ttl))
    }

    pub fn get_counter(&self, key: &str) -> Result<i64> {
        self.node.get_counter(key)
    }

    pub fn incr_counter(&self, key: &str, increment: i64, ttl: Ttl) -> Result<i64> {
        self.node.incr_counter(key, increment, self.resolve(ttl))
    }

    pub fn del_counter(&self, key: &str) -> Result<()> {
        self.node.del_counter(key)
    }

    pub fn expire_counter(&self, key: &str, ttl: Ttl) -> Result<()> {
        self.node.expire_counter(key, self.resolve(ttl))
    }

    // == Expire ==
    pub fn expire(&self, key: &str, ttl: Ttl) -> Result<()> {
        self.node.expire(key, self.resolve(ttl))
    }

    // == Load ==
    pub fn load<T, F>(&self, key: &str, ttl: Ttl, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> Result<T>,
    {
        self.node.load(key, self.resolve(ttl), loader)
    }

    // == Flush ==
    /// Not supported, same as for nodes.
    pub fn flush(&self) -> Result<()> {
        Err(CacheError::FeatureNotSupported("flush on a cache collection"))
    }

    // == Namespacing ==
    /// Returns a field bound to one key inside this collection.
    pub fn field(&self, name: impl Into<String>) -> Field {
        self.node.field(name)
    }
}
