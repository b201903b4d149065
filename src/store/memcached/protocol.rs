//! Memcached text protocol
//!
//! Request encoding and reply parsing for the verbs the store needs.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::codec::MAX_STORE_KEY_LENGTH;
use crate::error::{CacheError, Result};
use crate::store::CasToken;

// == Replies ==
/// Single-word status replies to storage and delete commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
}

/// A value returned by `get`/`gets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub data: Vec<u8>,
    pub cas: Option<CasToken>,
}

/// Which reply shape a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Retrieval,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Value(Option<Retrieved>),
    Status(Status),
}

// == Key Validation ==
/// Memcached keys are at most 250 bytes with no whitespace or control characters.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_STORE_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "memcached keys must be 1..={} bytes, got {}",
            MAX_STORE_KEY_LENGTH,
            key.len()
        )));
    }
    if key.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(CacheError::InvalidRequest(format!(
            "memcached key '{}' contains whitespace or control characters",
            key
        )));
    }
    Ok(())
}

// == Encoding ==
/// `get <key>` or `gets <key>`.
pub fn encode_retrieval(with_cas: bool, key: &str) -> Vec<u8> {
    let verb = if with_cas { "gets" } else { "get" };
    format!("{} {}\r\n", verb, key).into_bytes()
}

/// `set|add|cas <key> <flags> <exptime> <bytes> [<cas>]` followed by the data block.
pub fn encode_storage(
    verb: &str,
    key: &str,
    ttl: u32,
    value: &[u8],
    cas: Option<CasToken>,
) -> Vec<u8> {
    let header = match cas {
        Some(token) => format!("{} {} 0 {} {} {}\r\n", verb, key, ttl, value.len(), token),
        None => format!("{} {} 0 {} {}\r\n", verb, key, ttl, value.len()),
    };

    let mut request = Vec::with_capacity(header.len() + value.len() + 2);
    request.extend_from_slice(header.as_bytes());
    request.extend_from_slice(value);
    request.extend_from_slice(b"\r\n");
    request
}

pub fn encode_delete(key: &str) -> Vec<u8> {
    format!("delete {}\r\n", key).into_bytes()
}

/// ASCII authentication: a `set` whose data block is `"<user> <pass>"`.
pub fn encode_auth(username: &str, password: &str) -> Vec<u8> {
    let token = format!("{} {}", username, password);
    encode_storage("set", "auth", 0, token.as_bytes(), None)
}

pub const QUIT: &[u8] = b"quit\r\n";

/// Largest data block accepted in a reply (memcached's default item size limit).
pub const MAX_ITEM_SIZE: usize = 1024 * 1024;

// == Parsing ==
/// Reads the reply to one request.
pub async fn read_reply<R>(reader: &mut R, expect: Expect) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    match expect {
        Expect::Retrieval => read_retrieval(reader).await.map(Reply::Value),
        Expect::Status => read_status(reader).await.map(Reply::Status),
    }
}

async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 {
        return Err(CacheError::Transport(
            "connection closed by memcached server".to_string(),
        ));
    }
    let trimmed = line.trim_end_matches(&['\r', '\n'][..]).to_string();
    check_error_line(&trimmed)?;
    Ok(trimmed)
}

fn check_error_line(line: &str) -> Result<()> {
    if line == "ERROR" {
        return Err(CacheError::Transport(
            "memcached rejected the command".to_string(),
        ));
    }
    for prefix in ["CLIENT_ERROR", "SERVER_ERROR"] {
        if let Some(message) = line.strip_prefix(prefix) {
            return Err(CacheError::Transport(format!(
                "memcached {}:{}",
                prefix, message
            )));
        }
    }
    Ok(())
}

async fn read_status<R>(reader: &mut R) -> Result<Status>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    match line.as_str() {
        "STORED" => Ok(Status::Stored),
        "NOT_STORED" => Ok(Status::NotStored),
        "EXISTS" => Ok(Status::Exists),
        "NOT_FOUND" => Ok(Status::NotFound),
        "DELETED" => Ok(Status::Deleted),
        other => Err(unexpected(other)),
    }
}

async fn read_retrieval<R>(reader: &mut R) -> Result<Option<Retrieved>>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    if line == "END" {
        return Ok(None);
    }

    // VALUE <key> <flags> <bytes> [<cas unique>]
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() < 4 || fields[0] != "VALUE" {
        return Err(unexpected(&line));
    }
    let length: usize = fields[3].parse().map_err(|_| unexpected(&line))?;
    let cas = match fields.get(4) {
        Some(token) => Some(token.parse::<CasToken>().map_err(|_| unexpected(&line))?),
        None => None,
    };

    if length > MAX_ITEM_SIZE {
        return Err(CacheError::Transport(format!(
            "memcached announced a {} byte value, above the {} byte item limit",
            length, MAX_ITEM_SIZE
        )));
    }

    let mut block = vec![0u8; length + 2];
    reader.read_exact(&mut block).await?;
    if !block.ends_with(b"\r\n") {
        return Err(CacheError::Transport(
            "memcached data block not terminated by CRLF".to_string(),
        ));
    }
    block.truncate(length);

    let end = read_line(reader).await?;
    if end != "END" {
        return Err(unexpected(&end));
    }

    Ok(Some(Retrieved { data: block, cas }))
}

fn unexpected(line: &str) -> CacheError {
    CacheError::Transport(format!("unexpected memcached reply '{}'", line))
}
