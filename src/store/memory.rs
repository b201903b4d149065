//! Memory Store Module
//!
//! In-process store with memcached semantics: TTL expiry, CAS tokens and
//! add-if-absent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{AddOutcome, CasOutcome, CasToken, KvStore, StoredEntry};
use crate::error::Result;
use crate::tasks::spawn_cleanup_task;

// == Memory Store ==
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: RwLock<HashMap<String, StoredEntry>>,
    /// Last CAS token handed out
    last_cas: AtomicU64,
    /// Background purge task, if one was started
    janitor: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    // == Constructors ==
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose expired entries are purged every `cleanup_interval_secs`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_janitor(cleanup_interval_secs: u64) -> Arc<Self> {
        let store = Arc::new(Self::new());
        let handle = spawn_cleanup_task(Arc::downgrade(&store), cleanup_interval_secs);
        if let Ok(mut slot) = store.janitor.lock() {
            *slot = Some(handle);
        }
        store
    }

    fn next_cas(&self) -> CasToken {
        self.last_cas.fetch_add(1, Ordering::Relaxed) + 1
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    // == Length ==
    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|entry| !entry.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn live<'a>(entries: &'a HashMap<String, StoredEntry>, key: &str) -> Option<&'a StoredEntry> {
        entries.get(key).filter(|entry| !entry.is_expired())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(Self::live(&entries, key).map(|entry| entry.value.clone()))
    }

    async fn gets(&self, key: &str) -> Result<Option<(Vec<u8>, CasToken)>> {
        let entries = self.entries.read().await;
        Ok(Self::live(&entries, key).map(|entry| (entry.value.clone(), entry.cas)))
    }

    async fn set(&self, key: &str, ttl: u32, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoredEntry::new(value, self.next_cas(), ttl));
        Ok(())
    }

    async fn cas(
        &self,
        key: &str,
        token: CasToken,
        ttl: u32,
        value: Vec<u8>,
    ) -> Result<CasOutcome> {
        let mut entries = self.entries.write().await;
        let current = match Self::live(&entries, key) {
            Some(entry) => entry.cas,
            None => return Ok(CasOutcome::NotFound),
        };

        if current != token {
            return Ok(CasOutcome::Conflict);
        }

        entries.insert(key.to_string(), StoredEntry::new(value, self.next_cas(), ttl));
        Ok(CasOutcome::Applied)
    }

    async fn add(&self, key: &str, ttl: u32, value: Vec<u8>) -> Result<AddOutcome> {
        let mut entries = self.entries.write().await;
        if Self::live(&entries, key).is_some() {
            return Ok(AddOutcome::AlreadyExists);
        }

        entries.insert(key.to_string(), StoredEntry::new(value, self.next_cas(), ttl));
        Ok(AddOutcome::Created)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false))
    }

    async fn shutdown(&self) -> Result<()> {
        let handle = self.janitor.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.abort();
            debug!("Memory store janitor stopped");
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_store_new() {
        let store = MemoryStore::new();
        assert_eq!(store.len().await, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();

        store.set("key1", 0, b"value1".to_vec()).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_changes_token() {
        let store = MemoryStore::new();

        store.set("key1", 0, b"v1".to_vec()).await.unwrap();
        let (_, first) = store.gets("key1").await.unwrap().unwrap();
        store.set("key1", 0, b"v2".to_vec()).await.unwrap();
        let (value, second) = store.gets("key1").await.unwrap().unwrap();

        assert_eq!(value, b"v2".to_vec());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_cas_applied_then_stale() {
        let store = MemoryStore::new();
        store.set("group", 0, b"[]".to_vec()).await.unwrap();
        let (_, token) = store.gets("group").await.unwrap().unwrap();

        let first = store.cas("group", token, 0, b"[\"a\"]".to_vec()).await.unwrap();
        let second = store.cas("group", token, 0, b"[\"b\"]".to_vec()).await.unwrap();

        assert_eq!(first, CasOutcome::Applied);
        assert_eq!(second, CasOutcome::Conflict);
        assert_eq!(store.get("group").await.unwrap(), Some(b"[\"a\"]".to_vec()));
    }

    #[tokio::test]
    async fn test_cas_missing_key() {
        let store = MemoryStore::new();
        let outcome = store.cas("ghost", 1, 0, b"x".to_vec()).await.unwrap();
        assert_eq!(outcome, CasOutcome::NotFound);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_if_absent() {
        let store = MemoryStore::new();

        let created = store.add("key", 0, b"first".to_vec()).await.unwrap();
        let existing = store.add("key", 0, b"second".to_vec()).await.unwrap();

        assert_eq!(created, AddOutcome::Created);
        assert_eq!(existing, AddOutcome::AlreadyExists);
        assert_eq!(store.get("key").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.set("key", 0, b"v".to_vec()).await.unwrap();

        assert!(store.delete("key").await.unwrap());
        assert!(!store.delete("key").await.unwrap());
        assert_eq!(store.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = MemoryStore::new();
        store.set("short", 1, b"v".to_vec()).await.unwrap();
        store.set("long", 60, b"v".to_vec()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.gets("short").await.unwrap(), None);
        assert_eq!(store.add("short", 0, b"new".to_vec()).await.unwrap(), AddOutcome::Created);
        assert_eq!(store.purge_expired().await, 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set("short", 1, b"v".to_vec()).await.unwrap();
        store.set("long", 60, b"v".to_vec()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_janitor() {
        let store = MemoryStore::with_janitor(1);
        store.shutdown().await.unwrap();
        assert!(store.janitor.lock().unwrap().is_none());
    }
}
