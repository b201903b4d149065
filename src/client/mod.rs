//! Store Client Module
//!
//! Typed facade over a [`KvStore`]: encodes values, applies the configured
//! TTL, and bounds retrievals with a deadline when async retrieval is on.

mod stats;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::codec::{KeyCodec, ValueCodec};
use crate::config::{Backend, Config};
use crate::error::{CacheError, Result};
use crate::store::{AddOutcome, CasOutcome, CasToken, KvStore, MemcachedStore, MemoryStore};

pub use stats::{ClientStats, StatsSnapshot};

// == Retrieval Mode ==
/// How `get`/`get_with_cas` wait for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieval {
    /// Await the store directly; only the transport timeout applies
    Blocking,
    /// Run the request as a task and abort it once the deadline passes
    Deadline(Duration),
}

impl Retrieval {
    pub fn from_config(config: &Config) -> Self {
        if config.async_get {
            Retrieval::Deadline(config.async_timeout())
        } else {
            Retrieval::Blocking
        }
    }
}

// == Store Client ==
pub struct StoreClient {
    store: Arc<dyn KvStore>,
    keys: KeyCodec,
    values: ValueCodec,
    expiration: u32,
    retrieval: Retrieval,
    stats: ClientStats,
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("keys", &self.keys)
            .field("values", &self.values)
            .field("expiration", &self.expiration)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl StoreClient {
    // == Constructors ==
    /// Wraps an existing store.
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Self {
        Self {
            store,
            keys: KeyCodec::new(config.key_prefix.clone()),
            values: ValueCodec::new(config.compression),
            expiration: config.expiration,
            retrieval: Retrieval::from_config(config),
            stats: ClientStats::new(),
        }
    }

    /// Builds the backend named by the configuration.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn KvStore> = match config.backend {
            Backend::Memcached => Arc::new(
                MemcachedStore::connect(
                    &config.servers,
                    config.credentials(),
                    config.operation_timeout(),
                )
                .await?,
            ),
            Backend::Memory => MemoryStore::with_janitor(config.cleanup_interval),
        };
        debug!(config = ?config, "Running new store client");
        Ok(Self::new(store, config))
    }

    // == Accessors ==
    pub fn keys(&self) -> &KeyCodec {
        &self.keys
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // == Reads ==
    /// Reads and decodes the value at `key`.
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        let raw = self
            .bounded(key, |store, key| async move { store.get(&key).await })
            .await?;

        match raw {
            Some(bytes) => {
                self.stats.record_hit();
                self.values.decode(&bytes).map(Some)
            }
            None => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    /// Reads the value at `key` together with its CAS token.
    pub async fn get_with_cas<V: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<(V, CasToken)>> {
        let raw = self
            .bounded(key, |store, key| async move { store.gets(&key).await })
            .await?;

        match raw {
            Some((bytes, token)) => Ok(Some((self.values.decode(&bytes)?, token))),
            None => Ok(None),
        }
    }

    // == Writes ==
    /// Unconditionally stores `value` with the configured expiration.
    pub async fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<()> {
        let payload = self.values.encode(value)?;
        self.store.set(key, self.expiration, payload).await?;
        self.stats.record_store();
        Ok(())
    }

    /// Stores `value` only if `token` is still the current version of `key`.
    pub async fn cas<V: Serialize + ?Sized>(
        &self,
        key: &str,
        token: CasToken,
        value: &V,
    ) -> Result<CasOutcome> {
        let payload = self.values.encode(value)?;
        let outcome = self.store.cas(key, token, self.expiration, payload).await?;
        match outcome {
            CasOutcome::Applied => self.stats.record_store(),
            CasOutcome::Conflict | CasOutcome::NotFound => self.stats.record_cas_conflict(),
        }
        Ok(outcome)
    }

    /// Stores `value` only if `key` holds nothing.
    pub async fn add_if_absent<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
    ) -> Result<AddOutcome> {
        let payload = self.values.encode(value)?;
        let outcome = self.store.add(key, self.expiration, payload).await?;
        if outcome == AddOutcome::Created {
            self.stats.record_store();
        }
        Ok(outcome)
    }

    /// Deletes `key`, returning whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.store.delete(key).await?;
        self.stats.record_delete();
        Ok(existed)
    }

    /// Closes the underlying store.
    pub async fn shutdown(&self) -> Result<()> {
        self.store.shutdown().await
    }

    // == Deadline Handling ==
    /// Runs a retrieval according to the retrieval mode.
    ///
    /// In deadline mode the request runs as its own task; when the deadline
    /// passes the task is aborted so the request does not linger.
    async fn bounded<T, F, Fut>(&self, key: &str, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn KvStore>, String) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let request = op(Arc::clone(&self.store), key.to_string());

        let deadline = match self.retrieval {
            Retrieval::Blocking => return request.await,
            Retrieval::Deadline(deadline) => deadline,
        };

        let mut task = tokio::spawn(request);
        match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(CacheError::Internal(format!(
                "retrieval of '{}' failed: {}",
                key, join_error
            ))),
            Err(_) => {
                task.abort();
                self.stats.record_timeout();
                warn!(key, ?deadline, "Retrieval deadline exceeded, request cancelled");
                Err(CacheError::Timeout {
                    key: key.to_string(),
                    after: deadline,
                })
            }
        }
    }
}
