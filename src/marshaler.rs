//! Marshaler Module
//!
//! Serializes typed values to bytes and back for storage in a backend.
//!
//! The codec set is closed: dynamic dispatch over generic serde methods is
//! not object safe, so the marshaler is a plain enum selected once at
//! construction time. `Bincode` is the default binary format; `Json` is the
//! standard human-readable alternative.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};

// == Marshaler ==
/// Value codec used by a cache engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Marshaler {
    /// Compact binary encoding (default)
    #[default]
    Bincode,
    /// JSON encoding
    Json,
}

impl Marshaler {
    // == Marshal ==
    /// Serializes a value to bytes.
    pub fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Marshaler::Bincode => {
                bincode::serialize(value).map_err(|e| CacheError::Codec(e.to_string()))
            }
            Marshaler::Json => {
                serde_json::to_vec(value).map_err(|e| CacheError::Codec(e.to_string()))
            }
        }
    }

    // == Unmarshal ==
    /// Deserializes a value from bytes.
    pub fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Marshaler::Bincode => {
                bincode::deserialize(bytes).map_err(|e| CacheError::Codec(e.to_string()))
            }
            Marshaler::Json => {
                serde_json::from_slice(bytes).map_err(|e| CacheError::Codec(e.to_string()))
            }
        }
    }
}
