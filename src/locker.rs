//! Keyed Lock Module
//!
//! Per-key mutual exclusion used to serialize concurrent loads of the same
//! key. Locks are created lazily on first use and reclaimed when the last
//! waiter releases them, so an unbounded stream of distinct keys over time
//! keeps the registry bounded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

// == Key Lock ==
/// A single lock slot. Implemented with a flag and condvar rather than a
/// `MutexGuard` so the guard can outlive the registry's internal borrow.
#[derive(Debug, Default)]
struct KeyLock {
    locked: Mutex<bool>,
    cond: Condvar,
    /// Number of callers holding or waiting on this slot. Only mutated
    /// while the registry map lock is held.
    waiters: AtomicUsize,
}

impl KeyLock {
    fn acquire(&self) {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        while *locked {
            locked = self
                .cond
                .wait(locked)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *locked = true;
    }

    fn release(&self) {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        *locked = false;
        drop(locked);
        self.cond.notify_one();
    }
}

// == Key Lock Registry ==
/// Maps keys to lock slots.
///
/// Two different keys never contend; the same key across concurrent callers
/// strictly serializes. Creating one key's slot never blocks another key's
/// callers beyond the brief map access.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
    locks: Mutex<HashMap<String, Arc<KeyLock>>>,
}

impl KeyLockRegistry {
    // == Constructor ==
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Lock ==
    /// Acquires the lock for `key`, blocking while another caller holds it.
    ///
    /// The returned guard releases the lock on drop and removes the slot
    /// from the registry once no caller holds or waits on it.
    pub fn lock(&self, key: &str) -> KeyLockGuard<'_> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(KeyLock::default()));
            slot.waiters.fetch_add(1, Ordering::SeqCst);
            Arc::clone(slot)
        };
        slot.acquire();
        KeyLockGuard {
            registry: self,
            key: key.to_string(),
            slot,
        }
    }

    // == Length ==
    /// Returns the number of live lock slots.
    ///
    /// After every guard for a key has been dropped its slot is gone, so an
    /// idle registry reports zero regardless of how many keys it has seen.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Key Lock Guard ==
/// RAII guard for a per-key lock.
#[derive(Debug)]
pub struct KeyLockGuard<'a> {
    registry: &'a KeyLockRegistry,
    key: String,
    slot: Arc<KeyLock>,
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        self.slot.release();
        let mut locks = self
            .registry
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Last one out removes the slot. The decrement happens under the
        // map lock, so a concurrent `lock` call either finds the slot with
        // a live waiter count or creates a fresh one.
        if self.slot.waiters.fetch_sub(1, Ordering::SeqCst) == 1 {
            locks.remove(&self.key);
        }
    }
}
