//! Cache Module
//!
//! The host-facing cache contract and its group-invalidating implementation.


use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::client::StoreClient;
use crate::error::Result;
use crate::group::{GroupTracker, MembershipSet};
use crate::shared::shared_client;

// == Public Constants ==
/// Size reported by caches whose capacity is enforced by the store
pub const UNBOUNDED_SIZE: usize = usize::MAX;

// == Cache Contract ==
/// Operations a host expects from a named cache.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Name of the cache (the group id).
    fn id(&self) -> &str;

    async fn get_object<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Display + Sync + ?Sized,
        V: DeserializeOwned + Send;

    async fn put_object<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Display + Sync + ?Sized,
        V: Serialize + Sync + ?Sized;

    /// Removes the entry, returning the value it held.
    async fn remove_object<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Display + Sync + ?Sized,
        V: DeserializeOwned + Send;

    /// Evicts every entry put through this cache.
    async fn clear(&self) -> Result<()>;

    fn size(&self) -> usize;
}

// == Group Cache ==
/// A cache whose entries all belong to the group named by its id.
///
/// Reads go straight to the entry's store key and never consult the group
/// record, so they cost one round trip whatever the group size.
#[derive(Debug, Clone)]
pub struct GroupCache {
    id: String,
    group_key: String,
    client: Arc<StoreClient>,
    groups: GroupTracker,
}

impl GroupCache {
    // == Constructors ==
    /// Creates a cache named `id` on top of `client`.
    pub fn with_client(id: impl Into<String>, client: Arc<StoreClient>) -> Self {
        let id = id.into();
        let group_key = client.keys().to_group_key(&id);
        Self {
            id,
            group_key,
            groups: GroupTracker::new(Arc::clone(&client)),
            client,
        }
    }

    /// Creates a cache named `id` on the process-wide client.
    pub async fn open(id: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(id, shared_client().await?))
    }

    pub fn client(&self) -> &Arc<StoreClient> {
        &self.client
    }

    /// Store key of this cache's group record.
    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    // == Group Operations ==
    /// Store keys currently recorded for this cache.
    pub async fn members(&self) -> Result<MembershipSet> {
        Ok(self.groups.members(&self.group_key).await?.unwrap_or_default())
    }

    /// Evicts every member entry, returning the store keys that were deleted.
    pub async fn clear_group(&self) -> Result<MembershipSet> {
        self.groups.clear_group(&self.group_key).await
    }
}

#[async_trait]
impl Cache for GroupCache {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_object<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Display + Sync + ?Sized,
        V: DeserializeOwned + Send,
    {
        let store_key = self.client.keys().to_store_key(key);
        let value = self.client.get(&store_key).await?;
        debug!(cache = %self.id, store_key = %store_key, hit = value.is_some(), "Retrieved object");
        Ok(value)
    }

    async fn put_object<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Display + Sync + ?Sized,
        V: Serialize + Sync + ?Sized,
    {
        let store_key = self.client.keys().to_store_key(key);
        debug!(cache = %self.id, store_key = %store_key, "Putting object");

        self.client.set(&store_key, value).await?;
        self.groups.add_member(&self.group_key, &store_key).await
    }

    async fn remove_object<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Display + Sync + ?Sized,
        V: DeserializeOwned + Send,
    {
        let store_key = self.client.keys().to_store_key(key);
        debug!(cache = %self.id, store_key = %store_key, "Removing object");

        // Read and delete are separate round trips; a put landing in between
        // may be deleted or may survive.
        let value = self.client.get(&store_key).await?;
        if value.is_some() {
            self.client.delete(&store_key).await?;
        }
        Ok(value)
    }

    async fn clear(&self) -> Result<()> {
        self.clear_group().await.map(|_| ())
    }

    fn size(&self) -> usize {
        UNBOUNDED_SIZE
    }
}
