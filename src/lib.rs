//! Tiercache - a pluggable caching abstraction layer
//!
//! Provides a uniform façade over interchangeable cache backends with the
//! cross-cutting features backends themselves do not offer:
//!
//! - per-key locking so concurrent loads of the same missing key compute
//!   the value at most once (cache stampede protection)
//! - tiered group caches composing backends with differing TTL
//!   capabilities, with write fan-out and read-through back-fill
//! - counters independent from value storage
//! - key-prefix namespacing for composable sub-caches
//!
//! # Example
//! ```
//! use tiercache::{Cache, CacheConfig, Registry, Ttl};
//!
//! let registry = Registry::with_defaults();
//! let cache = Cache::open(&registry, &CacheConfig::new("memory")).unwrap();
//!
//! let value: String = cache
//!     .load("greeting", Ttl::Default, |_| Ok("hello".to_string()))
//!     .unwrap();
//! assert_eq!(value, "hello");
//! ```

pub mod cache;
pub mod config;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod group;
pub mod locker;
pub mod marshaler;
pub mod registry;
pub mod ttl;

pub use cache::{Cache, CacheStats, Collection, Field, Node, StatsSnapshot, KEY_SEPARATOR};
pub use config::CacheConfig;
pub use driver::Driver;
pub use error::{CacheError, Result};
pub use group::GroupCache;
pub use locker::KeyLockRegistry;
pub use marshaler::Marshaler;
pub use registry::{DriverFactory, Registry};
pub use ttl::Ttl;
