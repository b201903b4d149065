//! Stored Entry Module
//!
//! A single payload held by the in-memory store, with CAS token and expiry.

use std::time::{SystemTime, UNIX_EPOCH};

use super::{CasToken, RELATIVE_TTL_LIMIT};

// == Stored Entry ==
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The stored payload
    pub value: Vec<u8>,
    /// Version stamp, replaced on every write
    pub cas: CasToken,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates an entry expiring according to memcached TTL rules.
    ///
    /// # Arguments
    /// * `value` - The payload
    /// * `cas` - Version stamp for this write
    /// * `ttl` - Seconds; 0 never expires, above 30 days it is a Unix timestamp
    pub fn new(value: Vec<u8>, cas: CasToken, ttl: u32) -> Self {
        let expires_at = match ttl {
            0 => None,
            t if t > RELATIVE_TTL_LIMIT => Some(u64::from(t) * 1000),
            t => Some(current_timestamp_ms() + u64::from(t) * 1000),
        };

        Self {
            value,
            cas,
            expires_at,
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
