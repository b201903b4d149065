//! Connection to a single memcached server.

use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::protocol::{self, Expect, Reply, Status};
use crate::error::{CacheError, Result};

#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub username: String,
    pub password: String,
}

// == Connection ==
/// A lazily (re)established connection to one server.
///
/// `in_flight` stays set if a request future is dropped between writing the
/// request and reading the full reply. The stream is then out of sync and is
/// replaced before the next request.
#[derive(Debug)]
pub(crate) struct Connection {
    addr: String,
    credentials: Option<Credentials>,
    stream: Option<BufStream<TcpStream>>,
    in_flight: bool,
}

impl Connection {
    pub fn new(addr: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            addr: addr.into(),
            credentials,
            stream: None,
            in_flight: false,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    // == Connect ==
    /// Opens (and authenticates) the stream unless a usable one exists.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.in_flight {
            warn!(server = %self.addr, "Discarding connection left mid-request");
            self.stream = None;
            self.in_flight = false;
        }
        if self.stream.is_some() {
            return Ok(());
        }

        let tcp = TcpStream::connect(&self.addr).await.map_err(|e| {
            CacheError::Transport(format!("cannot connect to '{}': {}", self.addr, e))
        })?;
        tcp.set_nodelay(true)?;
        let mut stream = BufStream::new(tcp);

        if let Some(credentials) = &self.credentials {
            let request = protocol::encode_auth(&credentials.username, &credentials.password);
            stream.write_all(&request).await?;
            stream.flush().await?;
            match protocol::read_reply(&mut stream, Expect::Status).await {
                Ok(Reply::Status(Status::Stored)) => {}
                Ok(other) => {
                    return Err(CacheError::Transport(format!(
                        "authentication to '{}' failed: {:?}",
                        self.addr, other
                    )))
                }
                Err(e) => {
                    return Err(CacheError::Transport(format!(
                        "authentication to '{}' failed: {}",
                        self.addr, e
                    )))
                }
            }
        }

        debug!(server = %self.addr, "Connected to memcached");
        self.stream = Some(stream);
        Ok(())
    }

    // == Execute ==
    /// Sends one request and reads its reply.
    ///
    /// Any failure drops the stream; the next call reconnects.
    pub async fn execute(&mut self, request: &[u8], expect: Expect) -> Result<Reply> {
        self.ensure_connected().await?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(CacheError::Transport(format!(
                "no connection to '{}'",
                self.addr
            )));
        };

        self.in_flight = true;
        let result: Result<Reply> = async {
            stream.write_all(request).await?;
            stream.flush().await?;
            protocol::read_reply(stream, expect).await
        }
        .await;
        self.in_flight = false;

        if result.is_err() {
            self.stream = None;
        }
        result
    }

    // == Close ==
    /// Sends `quit` and closes the stream, if one is open.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let closed = async {
                stream.write_all(protocol::QUIT).await?;
                stream.flush().await?;
                stream.get_mut().shutdown().await
            }
            .await;
            if let Err(e) = closed {
                debug!(server = %self.addr, "Error while closing connection: {}", e);
            }
        }
        self.in_flight = false;
    }
}
