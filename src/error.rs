//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for all cache operations.
///
/// Callers can distinguish four classes of failure:
/// - "no data": [`CacheError::NotFound`]
/// - "operation invalid here": [`CacheError::KeyUnavailable`],
///   [`CacheError::FeatureNotSupported`]
/// - "backend policy" (advisory): [`CacheError::EntryTooLarge`],
///   [`CacheError::NotCacheable`]
/// - "hard failure": everything else
#[derive(Error, Debug)]
pub enum CacheError {
    /// Operation invoked with an empty or otherwise unusable key
    #[error("Key is empty or unavailable")]
    KeyUnavailable,

    /// Key not found in cache, or found but expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Backend rejected the write because the payload exceeds its size limit
    #[error("Entry too large for backend: {0}")]
    EntryTooLarge(String),

    /// Backend declined to cache this value for policy reasons
    #[error("Value not cacheable: {0}")]
    NotCacheable(String),

    /// Operation has no meaning for this backend or wrapper
    #[error("Feature not supported: {0}")]
    FeatureNotSupported(&'static str),

    /// No driver factory registered under this name
    #[error("Unknown cache driver: {0}")]
    UnknownDriver(String),

    /// No marshaler registered under this name
    #[error("Unknown marshaler: {0}")]
    UnknownMarshaler(String),

    /// Marshal/unmarshal failure
    #[error("Codec error: {0}")]
    Codec(String),

    /// Hard backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Opaque foreign error, typically raised by a loader function
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CacheError {
    // == Advisory Check ==
    /// Returns true for the advisory error pair.
    ///
    /// Advisory errors signal a per-backend policy decision, not a failure
    /// requiring abort: group fan-out and the load protocol proceed as if
    /// the write simply did not happen on that backend.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            CacheError::EntryTooLarge(_) | CacheError::NotCacheable(_)
        )
    }

    // == Not Found Check ==
    /// Returns true if this error means "no data".
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
