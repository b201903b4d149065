//! Memcached Store
//!
//! [`KvStore`] over the memcached text protocol. Keys are spread across the
//! configured servers by a stable hash so that every process routes a key to
//! the same server.

mod connection;
pub mod protocol;

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::info;

use self::connection::{Connection, Credentials};
use self::protocol::{Expect, Reply, Status};
use super::{AddOutcome, CasOutcome, CasToken, KvStore};
use crate::error::{CacheError, Result};

// == Memcached Store ==
#[derive(Debug)]
pub struct MemcachedStore {
    connections: Vec<Mutex<Connection>>,
    operation_timeout: Duration,
}

impl MemcachedStore {
    // == Constructor ==
    /// Connects to every server in `servers` (`host:port`).
    ///
    /// # Arguments
    /// * `servers` - Server addresses
    /// * `credentials` - Username and password for ASCII authentication
    /// * `operation_timeout` - Bound on every round trip, including connecting
    pub async fn connect(
        servers: &[String],
        credentials: Option<(&str, &str)>,
        operation_timeout: Duration,
    ) -> Result<Self> {
        if servers.is_empty() {
            return Err(CacheError::Config("no memcached servers configured".to_string()));
        }

        let credentials = credentials.map(|(username, password)| Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });

        let mut connections = Vec::with_capacity(servers.len());
        for server in servers {
            let mut connection = Connection::new(server.clone(), credentials.clone());
            tokio::time::timeout(operation_timeout, connection.ensure_connected())
                .await
                .map_err(|_| CacheError::Timeout {
                    key: server.clone(),
                    after: operation_timeout,
                })??;
            connections.push(Mutex::new(connection));
        }

        info!(servers = ?servers, "Memcached client connected");
        Ok(Self {
            connections,
            operation_timeout,
        })
    }

    /// Index of the server owning `key`.
    fn server_for(&self, key: &str) -> usize {
        if self.connections.len() == 1 {
            return 0;
        }
        let digest = Sha256::digest(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.connections.len() as u64) as usize
    }

    async fn execute(&self, key: &str, request: Vec<u8>, expect: Expect) -> Result<Reply> {
        protocol::validate_key(key)?;
        let mut connection = self.connections[self.server_for(key)].lock().await;

        match tokio::time::timeout(self.operation_timeout, connection.execute(&request, expect))
            .await
        {
            Ok(reply) => reply,
            Err(_) => Err(CacheError::Timeout {
                key: key.to_string(),
                after: self.operation_timeout,
            }),
        }
    }

    async fn retrieve(&self, key: &str, with_cas: bool) -> Result<Option<protocol::Retrieved>> {
        let request = protocol::encode_retrieval(with_cas, key);
        match self.execute(key, request, Expect::Retrieval).await? {
            Reply::Value(value) => Ok(value),
            Reply::Status(status) => Err(unexpected(status)),
        }
    }

    async fn store(
        &self,
        verb: &str,
        key: &str,
        ttl: u32,
        value: &[u8],
        cas: Option<CasToken>,
    ) -> Result<Status> {
        let request = protocol::encode_storage(verb, key, ttl, value, cas);
        match self.execute(key, request, Expect::Status).await? {
            Reply::Status(status) => Ok(status),
            Reply::Value(_) => Err(CacheError::Transport(format!(
                "unexpected value reply to '{}'",
                verb
            ))),
        }
    }
}

fn unexpected(status: Status) -> CacheError {
    CacheError::Transport(format!("unexpected memcached status {:?}", status))
}

#[async_trait]
impl KvStore for MemcachedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.retrieve(key, false).await?.map(|value| value.data))
    }

    async fn gets(&self, key: &str) -> Result<Option<(Vec<u8>, CasToken)>> {
        match self.retrieve(key, true).await? {
            Some(protocol::Retrieved {
                data,
                cas: Some(token),
            }) => Ok(Some((data, token))),
            Some(_) => Err(CacheError::Transport(
                "memcached 'gets' reply carried no CAS token".to_string(),
            )),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, ttl: u32, value: Vec<u8>) -> Result<()> {
        match self.store("set", key, ttl, &value, None).await? {
            Status::Stored => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn cas(
        &self,
        key: &str,
        token: CasToken,
        ttl: u32,
        value: Vec<u8>,
    ) -> Result<CasOutcome> {
        match self.store("cas", key, ttl, &value, Some(token)).await? {
            Status::Stored => Ok(CasOutcome::Applied),
            Status::Exists => Ok(CasOutcome::Conflict),
            Status::NotFound => Ok(CasOutcome::NotFound),
            other => Err(unexpected(other)),
        }
    }

    async fn add(&self, key: &str, ttl: u32, value: Vec<u8>) -> Result<AddOutcome> {
        match self.store("add", key, ttl, &value, None).await? {
            Status::Stored => Ok(AddOutcome::Created),
            Status::NotStored => Ok(AddOutcome::AlreadyExists),
            other => Err(unexpected(other)),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let request = protocol::encode_delete(key);
        match self.execute(key, request, Expect::Status).await? {
            Reply::Status(Status::Deleted) => Ok(true),
            Reply::Status(Status::NotFound) => Ok(false),
            Reply::Status(other) => Err(unexpected(other)),
            Reply::Value(_) => Err(CacheError::Transport(
                "unexpected value reply to 'delete'".to_string(),
            )),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        for connection in &self.connections {
            let mut connection = connection.lock().await;
            let addr = connection.addr().to_string();
            if tokio::time::timeout(self.operation_timeout, connection.close())
                .await
                .is_err()
            {
                info!(server = %addr, "Timed out closing memcached connection");
            }
        }
        info!("Memcached client shut down");
        Ok(())
    }
}
