//! Group Cache Module
//!
//! Composes an ordered list of cache engines (tiers) into one logical
//! cache. Tier 0 is the fastest, most ephemeral tier; later tiers are
//! slower and more durable. Writes fan out to every tier, each capped by
//! that tier's own TTL; reads cascade from fastest to slowest and back-fill
//! the tiers that missed.
//!
//! The group implements the [`Driver`] contract itself, so it can sit
//! behind a regular [`Cache`] engine; the registry exposes it as the
//! "group" driver whose payload is a list of nested cache configs.

pub(crate) mod entry;

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::Cache;
use crate::driver::Driver;
use crate::error::{CacheError, Result};
use crate::ttl::Ttl;

// == Write Mode ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Set,
    Update,
}

// == Group Cache ==
/// An ordered list of cache tiers behaving as one cache.
pub struct GroupCache {
    tiers: Vec<Cache>,
}

impl GroupCache {
    // == Constructor ==
    /// Creates a group from tiers ordered fastest first.
    pub fn new(tiers: Vec<Cache>) -> Self {
        Self { tiers }
    }

    /// The tiers, fastest first.
    pub fn tiers(&self) -> &[Cache] {
        &self.tiers
    }

    fn fastest(&self) -> Result<&Cache> {
        self.tiers
            .first()
            .ok_or_else(|| CacheError::Backend("group cache has no tiers".to_string()))
    }

    // == Fan-Out ==
    /// Writes a framed entry to the given tiers, capping each tier's TTL to
    /// `min(remaining lifetime, tier default TTL)`. Advisory errors are
    /// swallowed per tier; the last hard error wins.
    fn fan_out(
        &self,
        key: &str,
        framed: &[u8],
        expiry: u64,
        mode: Mode,
        tiers: &[Cache],
    ) -> Result<()> {
        let remaining = entry::remaining(expiry);
        let mut last_err = None;
        for tier in tiers {
            let ttl = cap_ttl(remaining, tier.default_ttl());
            let result = match mode {
                Mode::Set => tier.set_bytes(key, framed, ttl),
                Mode::Update => tier.update_bytes(key, framed, ttl),
            };
            match result {
                Ok(()) => {}
                Err(e) if e.is_advisory() => {
                    debug!(key, error = %e, "tier declined entry");
                }
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Shared body of `set_bytes` and `update_bytes`: frame once, write the
    /// fastest tier with the requested TTL, then fan out to the rest.
    fn write_all(&self, key: &str, value: &[u8], ttl: Option<Duration>, mode: Mode) -> Result<()> {
        let fastest = self.fastest()?;
        let expiry = entry::expiry_from_ttl(ttl);
        let framed = entry::encode(value, expiry);
        let result = match mode {
            Mode::Set => fastest.set_bytes(key, &framed, Ttl::from(ttl)),
            Mode::Update => fastest.update_bytes(key, &framed, Ttl::from(ttl)),
        };
        match result {
            Ok(()) => {}
            Err(e) if e.is_advisory() => {
                debug!(key, error = %e, "fastest tier declined entry");
            }
            Err(e) => return Err(e),
        }
        self.fan_out(key, &framed, expiry, mode, &self.tiers[1..])
    }
}

impl Driver for GroupCache {
    fn set_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.write_all(key, value, ttl, Mode::Set)
    }

    fn update_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.write_all(key, value, ttl, Mode::Update)
    }

    /// Read cascade: query tiers fastest to slowest, stop at the first tier
    /// holding a live entry, then back-fill every tier that missed. A tier
    /// holding an expired or malformed entry counts as a miss and the scan
    /// continues.
    fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let mut missed: Vec<&Cache> = Vec::new();
        let mut hit = None;
        for tier in &self.tiers {
            match tier.get_bytes(key) {
                Ok(raw) => match entry::decode(&raw) {
                    Some((payload, expiry)) => {
                        hit = Some((raw, payload, expiry));
                        break;
                    }
                    None => missed.push(tier),
                },
                Err(e) if e.is_not_found() => missed.push(tier),
                Err(e) => return Err(e),
            }
        }
        let (framed, payload, expiry) = match hit {
            Some(found) => found,
            None => return Err(CacheError::NotFound(key.to_string())),
        };

        // Best-effort back-fill of the tiers that missed.
        let remaining = entry::remaining(expiry);
        for tier in missed {
            let ttl = cap_ttl(remaining, tier.default_ttl());
            if let Err(e) = tier.set_bytes(key, &framed, ttl) {
                if !e.is_advisory() {
                    warn!(key, error = %e, "tier back-fill failed");
                }
            }
        }
        Ok(payload)
    }

    /// Batch reads consult only the fastest tier; there is no cascading
    /// for batch operations.
    fn mget_bytes(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let data = self.fastest()?.mget_bytes(keys)?;
        let mut result = HashMap::with_capacity(data.len());
        for (key, raw) in data {
            if let Some((payload, _)) = entry::decode(&raw) {
                result.insert(key, payload);
            }
        }
        Ok(result)
    }

    /// Batch writes go to the fastest tier only.
    fn mset_bytes(&self, values: &HashMap<String, Vec<u8>>, ttl: Option<Duration>) -> Result<()> {
        let expiry = entry::expiry_from_ttl(ttl);
        let framed: HashMap<String, Vec<u8>> = values
            .iter()
            .map(|(k, v)| (k.clone(), entry::encode(v, expiry)))
            .collect();
        self.fastest()?.mset_bytes(&framed, Ttl::from(ttl))
    }

    /// Deletes from every tier, continuing through failures; the last
    /// error encountered is returned.
    fn del(&self, key: &str) -> Result<()> {
        let mut last_err = None;
        for tier in &self.tiers {
            if let Err(e) = tier.del(key) {
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // Counters are not tiered: they delegate to the fastest tier only.

    fn set_counter(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<()> {
        self.fastest()?.set_counter(key, value, Ttl::from(ttl))
    }

    fn get_counter(&self, key: &str) -> Result<i64> {
        self.fastest()?.get_counter(key)
    }

    fn incr_counter(&self, key: &str, increment: i64, ttl: Option<Duration>) -> Result<i64> {
        self.fastest()?.incr_counter(key, increment, Ttl::from(ttl))
    }

    fn del_counter(&self, key: &str) -> Result<()> {
        self.fastest()?.del_counter(key)
    }

    fn expire_counter(&self, key: &str, ttl: Option<Duration>) -> Result<()> {
        self.fastest()?.expire_counter(key, Ttl::from(ttl))
    }

    /// Rewrites expiration by re-reading whichever tier answers and
    /// re-setting with the new TTL. A missing key is a no-op.
    fn expire(&self, key: &str, ttl: Option<Duration>) -> Result<()> {
        match self.get_bytes(key) {
            Ok(payload) => self.set_bytes(key, &payload, ttl),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn flush(&self) -> Result<()> {
        let mut last_err = None;
        for tier in &self.tiers {
            if let Err(e) = tier.flush() {
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn close(&self) -> Result<()> {
        let mut last_err = None;
        for tier in &self.tiers {
            if let Err(e) = tier.close() {
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// == TTL Capping ==
/// Effective write TTL for one tier: the shorter of the entry's remaining
/// lifetime and the tier's own TTL, with "never expires" on either side
/// deferring to the other.
fn cap_ttl(remaining: Option<Duration>, tier_max: Option<Duration>) -> Ttl {
    match (remaining, tier_max) {
        (None, None) => Ttl::Never,
        (None, Some(max)) => Ttl::After(max),
        (Some(rem), None) => Ttl::After(rem),
        (Some(rem), Some(max)) => Ttl::After(rem.min(max)),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::{MemoryCache, MemoryConfig};
    use crate::marshaler::Marshaler;
    use std::sync::Arc;
    use std::thread::sleep;

    fn new_tier(config: MemoryConfig, ttl: Ttl) -> Cache {
        let driver = Arc::new(MemoryCache::new(config));
        Cache::new(driver, Marshaler::Bincode).with_default_ttl(ttl)
    }

    fn two_tier_group() -> (GroupCache, Cache, Cache) {
        let fast = new_tier(MemoryConfig::default(), Ttl::Never);
        let slow = new_tier(MemoryConfig::default(), Ttl::Never);
        let group = GroupCache::new(vec![fast.clone(), slow.clone()]);
        (group, fast, slow)
    }

    #[test]
    fn test_cap_ttl() {
        let short = Duration::from_secs(60);
        let long = Duration::from_secs(3600);
        assert_eq!(cap_ttl(None, None), Ttl::Never);
        assert_eq!(cap_ttl(None, Some(short)), Ttl::After(short));
        assert_eq!(cap_ttl(Some(short), None), Ttl::After(short));
        assert_eq!(cap_ttl(Some(long), Some(short)), Ttl::After(short));
        assert_eq!(cap_ttl(Some(short), Some(long)), Ttl::After(short));
    }

    #[test]
    fn test_write_reaches_all_tiers() {
        let (group, fast, slow) = two_tier_group();
        group.set_bytes("k", b"value", None).unwrap();
        assert!(fast.get_bytes("k").is_ok());
        assert!(slow.get_bytes("k").is_ok());
        assert_eq!(group.get_bytes("k").unwrap(), b"value");
    }

    #[test]
    fn test_read_backfills_missed_tiers() {
        let (group, fast, slow) = two_tier_group();
        group.set_bytes("k", b"value", Some(Duration::from_secs(3600))).unwrap();
        fast.flush().unwrap();
        assert!(fast.get_bytes("k").is_err());

        assert_eq!(group.get_bytes("k").unwrap(), b"value");
        // The fast tier was repopulated from the slow tier and now answers
        // on its own.
        assert!(fast.get_bytes("k").is_ok());
        slow.flush().unwrap();
        assert_eq!(group.get_bytes("k").unwrap(), b"value");
    }

    #[test]
    fn test_tier_ttl_capping() {
        // The fan-out tier is capped at one second while the fastest tier
        // keeps the requested lifetime.
        let uncapped = new_tier(MemoryConfig::default(), Ttl::Never);
        let capped = new_tier(MemoryConfig::default(), Ttl::After(Duration::from_secs(1)));
        let group = GroupCache::new(vec![uncapped.clone(), capped.clone()]);

        group.set_bytes("k", b"v", Some(Duration::from_secs(3600))).unwrap();
        assert!(capped.get_bytes("k").is_ok());
        sleep(Duration::from_millis(1200));
        // The capped tier's copy is gone; the uncapped tier still answers.
        assert!(capped.get_bytes("k").is_err());
        assert!(uncapped.get_bytes("k").is_ok());
        assert_eq!(group.get_bytes("k").unwrap(), b"v");
    }

    #[test]
    fn test_entry_too_large_on_fastest_is_advisory() {
        let tiny = new_tier(
            MemoryConfig {
                max_value_size: 4,
                ..Default::default()
            },
            Ttl::Never,
        );
        let slow = new_tier(MemoryConfig::default(), Ttl::Never);
        let group = GroupCache::new(vec![tiny.clone(), slow.clone()]);

        group.set_bytes("k", b"a larger payload", None).unwrap();
        assert!(tiny.get_bytes("k").is_err());
        assert!(slow.get_bytes("k").is_ok());
        assert_eq!(group.get_bytes("k").unwrap(), b"a larger payload");
    }

    #[test]
    fn test_update_only_touches_existing() {
        let (group, fast, slow) = two_tier_group();
        group.update_bytes("k", b"v", None).unwrap();
        assert!(group.get_bytes("k").is_err());
        assert!(fast.get_bytes("k").is_err());
        assert!(slow.get_bytes("k").is_err());

        group.set_bytes("k", b"v1", None).unwrap();
        group.update_bytes("k", b"v2", None).unwrap();
        assert_eq!(group.get_bytes("k").unwrap(), b"v2");
    }

    #[test]
    fn test_del_hits_every_tier() {
        let (group, fast, slow) = two_tier_group();
        group.set_bytes("k", b"v", None).unwrap();
        group.del("k").unwrap();
        assert!(fast.get_bytes("k").is_err());
        assert!(slow.get_bytes("k").is_err());
        assert!(group.get_bytes("k").is_err());
        // Idempotent across the whole group.
        group.del("k").unwrap();
    }

    #[test]
    fn test_counters_use_fastest_tier_only() {
        let (group, fast, slow) = two_tier_group();
        assert_eq!(group.incr_counter("n", 2, None).unwrap(), 2);
        assert_eq!(fast.get_counter("n").unwrap(), 2);
        assert!(slow.get_counter("n").is_err());
    }

    #[test]
    fn test_mget_consults_fastest_only() {
        let (group, fast, slow) = two_tier_group();
        group.set_bytes("a", b"1", None).unwrap();
        fast.flush().unwrap();
        // "a" survives in the slow tier but batch reads do not cascade.
        let keys = vec!["a".to_string()];
        assert!(group.mget_bytes(&keys).unwrap().is_empty());
        assert!(slow.get_bytes("a").is_ok());
    }

    #[test]
    fn test_mset_writes_fastest_only() {
        let (group, fast, slow) = two_tier_group();
        let mut values = HashMap::new();
        values.insert("a".to_string(), b"1".to_vec());
        group.mset_bytes(&values, None).unwrap();
        assert!(fast.get_bytes("a").is_ok());
        assert!(slow.get_bytes("a").is_err());
        let got = group.mget_bytes(&["a".to_string()]).unwrap();
        assert_eq!(got["a"], b"1");
    }

    #[test]
    fn test_expire_missing_key_is_noop() {
        let (group, _, _) = two_tier_group();
        group.expire("missing", Some(Duration::from_secs(1))).unwrap();
    }

    #[test]
    fn test_flush_clears_all_tiers() {
        let (group, fast, slow) = two_tier_group();
        group.set_bytes("k", b"v", None).unwrap();
        group.flush().unwrap();
        assert!(fast.get_bytes("k").is_err());
        assert!(slow.get_bytes("k").is_err());
    }

    #[test]
    fn test_expired_entry_in_fast_tier_falls_through() {
        let (group, fast, slow) = two_tier_group();
        // Plant a framed entry in the fast tier that is already expired
        // and a live one in the slow tier.
        let dead = entry::encode(b"stale", 1);
        fast.set_bytes("k", &dead, Ttl::Never).unwrap();
        let live = entry::encode(b"fresh", 0);
        slow.set_bytes("k", &live, Ttl::Never).unwrap();

        assert_eq!(group.get_bytes("k").unwrap(), b"fresh");
    }
}
