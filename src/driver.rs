//! Storage Contract Module
//!
//! Defines the minimal operation set a cache backend must implement.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

// == Driver Trait ==
/// Storage contract implemented by every cache backend.
///
/// Drivers work on raw bytes and fully-prefixed keys; serialization and
/// key-prefixing happen above, in the cache engine. The `ttl` parameter is
/// always resolved by the engine: `None` means "never expires", never
/// "use a default".
///
/// Counters live in their own namespace. A counter and a byte value stored
/// under the same key must never alias the same slot.
///
/// Absence rules drivers must follow:
/// - `get_bytes` / `get_counter` return [`crate::CacheError::NotFound`] for
///   absent or expired keys
/// - `update_bytes` on an absent key is a silent no-op, not an error
/// - `del` / `del_counter` / `expire` / `expire_counter` on an absent key
///   succeed
/// - `mget_bytes` omits absent keys from the result map instead of failing
/// - `incr_counter` creates the counter with the increment as its initial
///   value when absent, and returns the post-increment value
pub trait Driver: Send + Sync {
    /// Stores bytes under a key.
    fn set_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Stores bytes under a key only if the key already exists.
    fn update_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Retrieves bytes by key.
    fn get_bytes(&self, key: &str) -> Result<Vec<u8>>;

    /// Retrieves multiple keys at once; absent keys are omitted.
    fn mget_bytes(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>>;

    /// Stores multiple key-value pairs at once.
    fn mset_bytes(&self, values: &HashMap<String, Vec<u8>>, ttl: Option<Duration>) -> Result<()>;

    /// Deletes a key. Deleting an absent key is not an error.
    fn del(&self, key: &str) -> Result<()>;

    /// Sets a counter to a value.
    fn set_counter(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<()>;

    /// Reads a counter.
    fn get_counter(&self, key: &str) -> Result<i64>;

    /// Atomically increments a counter, creating it if absent.
    fn incr_counter(&self, key: &str, increment: i64, ttl: Option<Duration>) -> Result<i64>;

    /// Deletes a counter. Deleting an absent counter is not an error.
    fn del_counter(&self, key: &str) -> Result<()>;

    /// Rewrites the expiration of an existing value. Absent key is a no-op.
    fn expire(&self, key: &str, ttl: Option<Duration>) -> Result<()>;

    /// Rewrites the expiration of an existing counter. Absent key is a no-op.
    fn expire_counter(&self, key: &str, ttl: Option<Duration>) -> Result<()>;

    /// Removes every entry, values and counters alike.
    fn flush(&self) -> Result<()>;

    /// Releases backend resources.
    fn close(&self) -> Result<()>;
}
