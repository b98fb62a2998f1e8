//! TTL Module
//!
//! Defines the time-to-live type shared by every cache operation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Ttl ==
/// Requested lifetime for a cache entry.
///
/// Drivers never see this type: the engine resolves `Default` against its
/// configured default TTL and hands drivers a plain `Option<Duration>`
/// where `None` means "never expires".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ttl {
    /// Use the cache's configured default TTL
    #[default]
    Default,
    /// Never expires
    Never,
    /// Expires after the given duration
    After(Duration),
}

impl Ttl {
    // == Resolve ==
    /// Resolves this TTL against a cache's default.
    ///
    /// `None` in and out means "never expires".
    pub fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Ttl::Default => default,
            Ttl::Never => None,
            Ttl::After(d) => Some(d),
        }
    }

    // == From Seconds ==
    /// Builds a TTL from a signed seconds count, the way configuration
    /// files express it: zero or negative means "never expires".
    pub fn from_secs(secs: i64) -> Self {
        if secs <= 0 {
            Ttl::Never
        } else {
            Ttl::After(Duration::from_secs(secs as u64))
        }
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(d: Option<Duration>) -> Self {
        match d {
            Some(d) => Ttl::After(d),
            None => Ttl::Never,
        }
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default() {
        let default = Some(Duration::from_secs(300));
        assert_eq!(Ttl::Default.resolve(default), default);
        assert_eq!(Ttl::Default.resolve(None), None);
    }

    #[test]
    fn test_resolve_never() {
        assert_eq!(Ttl::Never.resolve(Some(Duration::from_secs(300))), None);
    }

    #[test]
    fn test_resolve_after() {
        let d = Duration::from_secs(60);
        assert_eq!(Ttl::After(d).resolve(None), Some(d));
    }

    #[test]
    fn test_from_secs() {
        assert_eq!(Ttl::from_secs(0), Ttl::Never);
        assert_eq!(Ttl::from_secs(-1), Ttl::Never);
        assert_eq!(Ttl::from_secs(60), Ttl::After(Duration::from_secs(60)));
    }
}
