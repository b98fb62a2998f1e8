//! Integration Tests for the Caching Layer
//!
//! Exercises the public construction path end to end: registry plus config,
//! typed storage, namespacing wrappers, group tiers built from nested
//! configs, and stampede protection under real thread pressure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use tiercache::{Cache, CacheConfig, CacheError, Registry, Ttl};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    token: String,
}

// == Construction Path ==

#[test]
fn test_open_memory_cache_from_config() {
    init_tracing();
    let registry = Registry::with_defaults();
    let config = CacheConfig::new("memory")
        .with_marshaler("json")
        .with_ttl_secs(300)
        .with_key_prefix("app:");
    let cache = Cache::open(&registry, &config).unwrap();

    let session = Session {
        user_id: 7,
        token: "abc".to_string(),
    };
    cache.set("session", &session, Ttl::Default).unwrap();
    let got: Session = cache.get("session").unwrap();
    assert_eq!(got, session);
    assert_eq!(cache.final_key("session"), "app:session");
    assert_eq!(cache.default_ttl(), Some(Duration::from_secs(300)));
}

#[test]
fn test_open_rejects_unknown_names() {
    let registry = Registry::with_defaults();
    assert!(matches!(
        Cache::open(&registry, &CacheConfig::new("redis")),
        Err(CacheError::UnknownDriver(_))
    ));
    assert!(matches!(
        Cache::open(&registry, &CacheConfig::new("memory").with_marshaler("xml")),
        Err(CacheError::UnknownMarshaler(_))
    ));
}

#[test]
fn test_memory_driver_config_payload_applies() {
    init_tracing();
    let registry = Registry::with_defaults();
    let config = CacheConfig::new("memory").with_config(json!({ "max_value_size": 8 }));
    let cache = Cache::open(&registry, &config).unwrap();

    cache.set_bytes("small", b"ok", Ttl::Default).unwrap();
    assert!(matches!(
        cache.set_bytes("big", &[0u8; 64], Ttl::Default),
        Err(CacheError::EntryTooLarge(_))
    ));
}

// == Stampede Protection ==

#[test]
fn test_load_storm_runs_each_loader_once() {
    init_tracing();
    let registry = Registry::with_defaults();
    let cache = Arc::new(Cache::open(&registry, &CacheConfig::new("memory")).unwrap());

    let keys: Vec<String> = (0..10).map(|i| format!("key-{}", i)).collect();
    let counters: Arc<HashMap<String, AtomicU64>> = Arc::new(
        keys.iter()
            .map(|k| (k.clone(), AtomicU64::new(0)))
            .collect(),
    );

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let counters = Arc::clone(&counters);
            let keys = keys.clone();
            thread::spawn(move || {
                for key in &keys {
                    let value: String = cache
                        .load(key, Ttl::Default, |k| {
                            counters[k].fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(5));
                            Ok(format!("value-for-{}", k))
                        })
                        .unwrap();
                    assert_eq!(value, format!("value-for-{}", key));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for key in &keys {
        assert_eq!(counters[key].load(Ordering::SeqCst), 1, "{}", key);
    }
}

#[test]
fn test_load_serves_value_the_backend_declined() {
    init_tracing();
    let registry = Registry::with_defaults();
    let config = CacheConfig::new("memory").with_config(json!({ "max_value_size": 4 }));
    let cache = Cache::open(&registry, &config).unwrap();

    // The payload exceeds the backend limit, so it is computed but never
    // stored; every load runs the loader again.
    let calls = AtomicU64::new(0);
    for _ in 0..2 {
        let value: String = cache
            .load("k", Ttl::Default, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("a value too long to store".to_string())
            })
            .unwrap();
        assert_eq!(value, "a value too long to store");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(matches!(
        cache.get::<String>("k"),
        Err(CacheError::NotFound(_))
    ));
}

// == Namespacing ==

#[test]
fn test_node_keys_are_visible_under_composed_prefix() {
    let registry = Registry::with_defaults();
    let cache = Cache::open(&registry, &CacheConfig::new("memory")).unwrap();

    let users = cache.node("users");
    users.set("1", &"alice".to_string(), Ttl::Default).unwrap();

    // The node stores under its composed final key on the same backend.
    assert_eq!(cache.get::<String>("users.1").unwrap(), "alice");
    assert!(matches!(
        cache.get::<String>("1"),
        Err(CacheError::NotFound(_))
    ));

    // Sibling nodes are isolated.
    let orders = cache.node("orders");
    assert!(matches!(
        orders.get::<String>("1"),
        Err(CacheError::NotFound(_))
    ));
}

#[test]
fn test_collection_applies_its_own_ttl() {
    let registry = Registry::with_defaults();
    let cache = Cache::open(&registry, &CacheConfig::new("memory")).unwrap();

    let sessions = cache.collection("sessions", Ttl::After(Duration::from_millis(50)));
    sessions.set("s1", &1u32, Ttl::Default).unwrap();
    assert_eq!(sessions.get::<u32>("s1").unwrap(), 1);
    thread::sleep(Duration::from_millis(80));
    assert!(matches!(
        sessions.get::<u32>("s1"),
        Err(CacheError::NotFound(_))
    ));
}

#[test]
fn test_field_binds_one_key() {
    let registry = Registry::with_defaults();
    let cache = Cache::open(&registry, &CacheConfig::new("memory")).unwrap();

    let flag = cache.field("maintenance");
    flag.set(&true, Ttl::Default).unwrap();
    assert!(flag.get::<bool>().unwrap());
    flag.del().unwrap();
    assert!(matches!(flag.get::<bool>(), Err(CacheError::NotFound(_))));
}

// == Group Tiers ==

#[test]
fn test_group_cache_from_nested_configs() {
    init_tracing();
    let registry = Registry::with_defaults();
    let config = CacheConfig::new("group").with_config(json!([
        { "driver": "memory", "ttl_secs": 60 },
        { "driver": "memory" }
    ]));
    let cache = Cache::open(&registry, &config).unwrap();

    cache.set("k", &42u64, Ttl::Default).unwrap();
    assert_eq!(cache.get::<u64>("k").unwrap(), 42);

    cache.del("k").unwrap();
    assert!(matches!(cache.get::<u64>("k"), Err(CacheError::NotFound(_))));

    // Counters work through the group as on a plain engine.
    assert_eq!(cache.incr_counter("hits", 1, Ttl::Default).unwrap(), 1);
    assert_eq!(cache.incr_counter("hits", 1, Ttl::Default).unwrap(), 2);
}

#[test]
fn test_group_survives_fast_tier_eviction() {
    init_tracing();
    let registry = Registry::with_defaults();
    // The fast tier holds a single entry, so a second write evicts the
    // first; the slower tier still has it and serves the read.
    let config = CacheConfig::new("group").with_config(json!([
        { "driver": "memory", "config": { "max_entries": 1 } },
        { "driver": "memory" }
    ]));
    let cache = Cache::open(&registry, &config).unwrap();

    cache.set("a", &1u32, Ttl::Default).unwrap();
    cache.set("b", &2u32, Ttl::Default).unwrap();
    assert_eq!(cache.get::<u32>("a").unwrap(), 1);
    assert_eq!(cache.get::<u32>("b").unwrap(), 2);
}

#[test]
fn test_group_load_survives_fastest_tier_size_limit() {
    init_tracing();
    let registry = Registry::with_defaults();
    // The fastest tier rejects everything over four bytes; the slower tier
    // still stores the value, so repeated loads never re-run the loader.
    let config = CacheConfig::new("group").with_config(json!([
        { "driver": "memory", "config": { "max_value_size": 4 } },
        { "driver": "memory" }
    ]));
    let cache = Cache::open(&registry, &config).unwrap();

    let calls = AtomicU64::new(0);
    for _ in 0..3 {
        let value: String = cache
            .load("k", Ttl::Default, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("a value the fast tier cannot hold".to_string())
            })
            .unwrap();
        assert_eq!(value, "a value the fast tier cannot hold");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Statistics ==

#[test]
fn test_stats_reflect_traffic() {
    let registry = Registry::with_defaults();
    let cache = Cache::open(&registry, &CacheConfig::new("memory")).unwrap();

    cache.set("k", &1u32, Ttl::Default).unwrap();
    cache.get::<u32>("k").unwrap();
    cache.get::<u32>("k").unwrap();
    let _ = cache.get::<u32>("missing");

    let snapshot = cache.stats();
    assert_eq!(snapshot.hits, 2);
    assert_eq!(snapshot.misses, 1);
    assert!((snapshot.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
}
