//! Driver Module
//!
//! Concrete storage backends implementing the [`crate::Driver`] contract.

pub mod memory;

pub use memory::{MemoryCache, MemoryConfig};
