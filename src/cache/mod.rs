//! Cache Module
//!
//! The driver-agnostic cache engine and its namespacing wrappers.

mod collection;
mod engine;
mod field;
mod node;
mod stats;


// Re-export public types
pub use collection::Collection;
pub use engine::Cache;
pub use field::Field;
pub use node::Node;
pub use stats::{CacheStats, StatsSnapshot};

// == Public Constants ==
/// Separator inserted between a namespace prefix and the rest of the key
pub const KEY_SEPARATOR: &str = ".";
