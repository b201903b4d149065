//! Key Codec
//!
//! Hashes application keys and group ids into fixed-length store keys.

use std::fmt::Display;

use sha2::{Digest, Sha256};
use tracing::trace;

/// Hashed ahead of a group id. 0xff never occurs in UTF-8, so no
/// application key digests the same input as a group.
const GROUP_DOMAIN: &[u8] = b"\xffgroup\x00";

// == Key Codec ==
/// Converts application keys and group ids into store keys.
///
/// The store key is `prefix + hex(sha256(key.to_string()))`. The digest keeps
/// the key length fixed no matter how large the application key is, and is
/// identical across processes and restarts.
///
/// Group ids hash in their own domain: a group's record never shares a
/// store key with an entry, whatever the entry's key.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    prefix: String,
}

impl KeyCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the store key for `key`.
    pub fn to_store_key<K: Display + ?Sized>(&self, key: &K) -> String {
        let digest = Sha256::digest(key.to_string().as_bytes());
        let store_key = format!("{}{}", self.prefix, hex::encode(digest));
        trace!(store_key = %store_key, "Converted object key");
        store_key
    }

    /// Returns the store key of the membership record of group `id`.
    pub fn to_group_key(&self, id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(GROUP_DOMAIN);
        hasher.update(id.as_bytes());
        let group_key = format!("{}{}", self.prefix, hex::encode(hasher.finalize()));
        trace!(group_key = %group_key, "Converted group id");
        group_key
    }
}
