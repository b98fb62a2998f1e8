//! Group Entry Framing
//!
//! Lower tiers of a group cache may not support TTL natively, so the group
//! stores expiration inline: an 8-byte big-endian absolute Unix-seconds
//! timestamp header followed by the payload. A zero header means "never
//! expires". A too-short buffer or an elapsed timestamp reads as "not
//! found".

use std::time::Duration;

use crate::ttl::unix_now;

/// Size of the expiration header in bytes.
pub(crate) const HEADER_LEN: usize = 8;

/// Header value meaning "never expires".
const NEVER: u64 = 0;

// == Encode ==
/// Frames a payload with its absolute expiration (0 = never).
pub(crate) fn encode(payload: &[u8], expiry: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&expiry.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

// == Decode ==
/// Unframes an entry. Returns `None` for a malformed (too short) buffer or
/// an entry whose expiration has passed; callers treat both as a miss.
pub(crate) fn decode(raw: &[u8]) -> Option<(Vec<u8>, u64)> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    let header: [u8; HEADER_LEN] = raw[..HEADER_LEN].try_into().ok()?;
    let expiry = u64::from_be_bytes(header);
    if expiry != NEVER && expiry < unix_now() {
        return None;
    }
    Some((raw[HEADER_LEN..].to_vec(), expiry))
}

// == Expiry Arithmetic ==
/// Absolute expiration for a resolved TTL (0 = never).
pub(crate) fn expiry_from_ttl(ttl: Option<Duration>) -> u64 {
    match ttl {
        None => NEVER,
        Some(d) => unix_now() + d.as_secs(),
    }
}

/// Remaining lifetime of an entry; `None` means it never expires.
pub(crate) fn remaining(expiry: u64) -> Option<Duration> {
    if expiry == NEVER {
        None
    } else {
        Some(Duration::from_secs(expiry.saturating_sub(unix_now())))
    }
}
