//! Store Module
//!
//! The key-value store port and its implementations.
//!
//! The store is flat, TTL based and offers single-key operations only. Its
//! one concurrency primitive is compare-and-swap: `gets` hands out a token,
//! `cas` writes only if the token is still current.

mod entry;
pub mod memcached;
mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use entry::{current_timestamp_ms, StoredEntry};
pub use memcached::MemcachedStore;
pub use memory::MemoryStore;

// == Public Constants ==
/// TTLs above this many seconds are absolute Unix timestamps
pub const RELATIVE_TTL_LIMIT: u32 = 60 * 60 * 24 * 30;

/// Opaque version stamp returned by `gets` and required by `cas`.
pub type CasToken = u64;

// == Outcomes ==
/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The token matched and the value was written
    Applied,
    /// Someone else wrote the key since the token was issued
    Conflict,
    /// The key no longer exists
    NotFound,
}

/// Result of an add-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    AlreadyExists,
}

// == KvStore Port ==
/// Byte-level operations offered by the underlying store.
///
/// `ttl` is in seconds: 0 never expires, values above
/// [`RELATIVE_TTL_LIMIT`] are absolute Unix timestamps.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn gets(&self, key: &str) -> Result<Option<(Vec<u8>, CasToken)>>;

    async fn set(&self, key: &str, ttl: u32, value: Vec<u8>) -> Result<()>;

    async fn cas(
        &self,
        key: &str,
        token: CasToken,
        ttl: u32,
        value: Vec<u8>,
    ) -> Result<CasOutcome>;

    async fn add(&self, key: &str, ttl: u32, value: Vec<u8>) -> Result<AddOutcome>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Releases connections and background work.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
