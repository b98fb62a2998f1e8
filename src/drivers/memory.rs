//! In-Memory Driver Module
//!
//! HashMap-backed storage with TTL expiration, LRU eviction and an optional
//! background janitor thread. Values and counters live in separate maps, so
//! a counter never aliases a byte value stored under the same key.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::Driver;
use crate::error::{CacheError, Result};

// == Memory Config ==
/// Configuration for the in-memory driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of value entries before LRU eviction; 0 = unlimited
    pub max_entries: usize,
    /// Maximum value size in bytes; writes above it fail with
    /// `EntryTooLarge`; 0 = unlimited
    pub max_value_size: usize,
    /// Janitor sweep interval in seconds; 0 disables the janitor
    pub cleanup_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 0,
            max_value_size: 0,
            cleanup_interval_secs: 0,
        }
    }
}

// == Stored Entry ==
#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    /// Expiration as Unix milliseconds; None = never expires
    expires_at: Option<u64>,
}

impl StoredEntry {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }
}

#[derive(Debug, Clone)]
struct StoredCounter {
    value: i64,
    expires_at: Option<u64>,
}

impl StoredCounter {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }
}

// == LRU Tracker ==
/// Access order for value entries: front = most recently used.
#[derive(Debug, Default)]
struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

// == Store ==
#[derive(Debug, Default)]
struct Store {
    entries: HashMap<String, StoredEntry>,
    lru: LruTracker,
}

#[derive(Debug, Default)]
struct Shared {
    store: Mutex<Store>,
    counters: Mutex<HashMap<String, StoredCounter>>,
}

impl Shared {
    /// Removes every expired value and counter. Returns the removed count.
    fn sweep_expired(&self) -> usize {
        let now = now_ms();
        let mut removed = 0;

        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            store.entries.remove(&key);
            store.lru.remove(&key);
            removed += 1;
        }
        drop(store);

        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let before = counters.len();
        counters.retain(|_, c| !c.is_expired(now));
        removed += before - counters.len();

        removed
    }
}

// == Memory Cache ==
/// The in-memory driver.
pub struct MemoryCache {
    shared: Arc<Shared>,
    config: MemoryConfig,
    janitor_stop: Arc<AtomicBool>,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates a driver and, if configured, spawns its janitor thread.
    pub fn new(config: MemoryConfig) -> Self {
        let shared = Arc::new(Shared::default());
        let janitor_stop = Arc::new(AtomicBool::new(false));
        if config.cleanup_interval_secs > 0 {
            spawn_janitor(
                Arc::downgrade(&shared),
                Arc::clone(&janitor_stop),
                Duration::from_secs(config.cleanup_interval_secs),
            );
        }
        Self {
            shared,
            config,
            janitor_stop,
        }
    }

    /// Removes all expired entries immediately. Returns the removed count.
    pub fn cleanup_expired(&self) -> usize {
        self.shared.sweep_expired()
    }

    /// Current number of live value entries.
    pub fn len(&self) -> usize {
        self.shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_size(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.config.max_value_size > 0 && value.len() > self.config.max_value_size {
            return Err(CacheError::EntryTooLarge(key.to_string()));
        }
        Ok(())
    }

    fn write_entry(&self, store: &mut Store, key: &str, value: &[u8], ttl: Option<Duration>) {
        let is_overwrite = store.entries.contains_key(key);
        if !is_overwrite && self.config.max_entries > 0 && store.entries.len() >= self.config.max_entries
        {
            if let Some(evicted) = store.lru.evict_oldest() {
                store.entries.remove(&evicted);
                debug!(key = %evicted, "evicted least recently used entry");
            }
        }
        store.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_vec(),
                expires_at: expires_at(ttl),
            },
        );
        store.lru.touch(key);
    }
}

impl Driver for MemoryCache {
    fn set_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.check_size(key, value)?;
        let mut store = self
            .shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.write_entry(&mut store, key, value, ttl);
        Ok(())
    }

    fn update_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.check_size(key, value)?;
        let now = now_ms();
        let mut store = self
            .shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Update-only: absence (or expiry) is a silent no-op.
        match store.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.write_entry(&mut store, key, value, ttl);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let now = now_ms();
        let mut store = self
            .shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match store.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                store.entries.remove(key);
                store.lru.remove(key);
                Err(CacheError::NotFound(key.to_string()))
            }
            Some(entry) => {
                let value = entry.value.clone();
                store.lru.touch(key);
                Ok(value)
            }
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    fn mget_bytes(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let mut result = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.get_bytes(key) {
                Ok(value) => {
                    result.insert(key.clone(), value);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    fn mset_bytes(&self, values: &HashMap<String, Vec<u8>>, ttl: Option<Duration>) -> Result<()> {
        for (key, value) in values {
            self.set_bytes(key, value, ttl)?;
        }
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        let mut store = self
            .shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        store.entries.remove(key);
        store.lru.remove(key);
        Ok(())
    }

    fn set_counter(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<()> {
        let mut counters = self
            .shared
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        counters.insert(
            key.to_string(),
            StoredCounter {
                value,
                expires_at: expires_at(ttl),
            },
        );
        Ok(())
    }

    fn get_counter(&self, key: &str) -> Result<i64> {
        let now = now_ms();
        let mut counters = self
            .shared
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match counters.get(key) {
            Some(counter) if counter.is_expired(now) => {
                counters.remove(key);
                Err(CacheError::NotFound(key.to_string()))
            }
            Some(counter) => Ok(counter.value),
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    fn incr_counter(&self, key: &str, increment: i64, ttl: Option<Duration>) -> Result<i64> {
        let now = now_ms();
        let mut counters = self
            .shared
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Absent or expired counters restart from the increment itself.
        // Saturate at the i64 bounds instead of overflowing.
        let value = match counters.get(key) {
            Some(counter) if !counter.is_expired(now) => counter.value.saturating_add(increment),
            _ => increment,
        };
        counters.insert(
            key.to_string(),
            StoredCounter {
                value,
                expires_at: expires_at(ttl),
            },
        );
        Ok(value)
    }

    fn del_counter(&self, key: &str) -> Result<()> {
        self.shared
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn expire(&self, key: &str, ttl: Option<Duration>) -> Result<()> {
        let now = now_ms();
        let mut store = self
            .shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = store.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.expires_at = expires_at(ttl);
            }
        }
        Ok(())
    }

    fn expire_counter(&self, key: &str, ttl: Option<Duration>) -> Result<()> {
        let now = now_ms();
        let mut counters = self
            .shared
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = counters.get_mut(key) {
            if !counter.is_expired(now) {
                counter.expires_at = expires_at(ttl);
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut store = self
            .shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        store.entries.clear();
        store.lru.clear();
        drop(store);
        self.shared
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.janitor_stop.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        self.janitor_stop.store(true, Ordering::SeqCst);
    }
}

// == Janitor ==
/// Spawns the background sweep thread. The thread holds only a weak
/// reference, so dropping the driver ends it at the next tick.
fn spawn_janitor(shared: Weak<Shared>, stop: Arc<AtomicBool>, interval: Duration) {
    thread::spawn(move || {
        debug!(interval_secs = interval.as_secs(), "janitor started");
        loop {
            thread::sleep(interval);
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let Some(shared) = shared.upgrade() else {
                break;
            };
            let removed = shared.sweep_expired();
            if removed > 0 {
                debug!(removed, "janitor removed expired entries");
            }
        }
        debug!("janitor stopped");
    });
}

// == Utility Functions ==
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

fn expires_at(ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|d| now_ms() + d.as_millis() as u64)
}
