//! Configuration Module
//!
//! Loads the cache configuration from property sources (a `key=value` file,
//! the environment, or any iterator of pairs). Every recognised property is
//! described by one row of [`PROPERTIES`]; rows are applied on top of
//! [`Config::default`] and a value that fails to parse keeps the default.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::error::{CacheError, Result};

/// Env var naming a properties file to load instead of the environment.
pub const PROPERTIES_PATH_ENV: &str = "GROUP_CACHE_PROPERTIES";

/// Longest prefix that still leaves room for the 64 hex chars of the hash
/// under memcached's 250 byte key limit.
pub const MAX_KEY_PREFIX_LENGTH: usize = 186;

// == Backend ==
/// Which store implementation the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Remote memcached servers over the text protocol
    Memcached,
    /// In-process store with memcached semantics
    Memory,
}

// == Config ==
/// Cache configuration parameters.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Prefix prepended to every store key
    pub key_prefix: String,
    /// TTL in seconds applied to entries and group records
    pub expiration: u32,
    /// Deadline amount for async retrieval
    pub timeout: u64,
    /// Unit of `timeout`
    pub time_unit: TimeUnit,
    /// Retrieve with a deadline (and cancel on expiry) instead of blocking
    pub async_get: bool,
    /// Gzip payloads before storing them
    pub compression: bool,
    /// Memcached servers as `host:port`
    pub servers: Vec<String>,
    /// ASCII auth username
    pub username: Option<String>,
    /// ASCII auth password
    pub password: Option<String>,
    /// Per round-trip transport timeout in milliseconds
    pub operation_timeout_ms: u64,
    /// Store implementation
    pub backend: Backend,
    /// HTTP server port
    pub server_port: u16,
    /// Janitor interval in seconds (memory backend)
    pub cleanup_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_prefix: "_mybatis_".to_string(),
            expiration: 60 * 60 * 24 * 30,
            timeout: 5,
            time_unit: TimeUnit::Seconds,
            async_get: false,
            compression: false,
            servers: vec!["localhost:11211".to_string()],
            username: None,
            password: None,
            operation_timeout_ms: 2500,
            backend: Backend::Memcached,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("key_prefix", &self.key_prefix)
            .field("expiration", &self.expiration)
            .field("timeout", &self.timeout)
            .field("time_unit", &self.time_unit)
            .field("async_get", &self.async_get)
            .field("compression", &self.compression)
            .field("servers", &self.servers)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("operation_timeout_ms", &self.operation_timeout_ms)
            .field("backend", &self.backend)
            .field("server_port", &self.server_port)
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

impl Config {
    // == Loading ==
    /// Builds a Config from `(property, value)` pairs such as `("expiration", "60")`.
    ///
    /// Unknown properties are ignored.
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in properties {
            if let Some(property) = PROPERTIES.iter().find(|p| p.key == key.as_ref()) {
                property.apply(&mut config, value.as_ref());
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads a `key=value` properties file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path).map_err(|e| {
            CacheError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;

        let mut pairs = Vec::new();
        for entry in entries {
            let pair = entry.map_err(|e| {
                CacheError::Config(format!("malformed line in '{}': {}", path.display(), e))
            })?;
            pairs.push(pair);
        }
        Self::from_properties(pairs)
    }

    /// Loads values from `GROUP_CACHE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let pairs = PROPERTIES
            .iter()
            .filter_map(|p| std::env::var(p.env).ok().map(|v| (p.key, v)));
        Self::from_properties(pairs)
    }

    /// Loads from the file named by `GROUP_CACHE_PROPERTIES`, or from the environment.
    pub fn load() -> Result<Self> {
        match std::env::var(PROPERTIES_PATH_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Self::from_env(),
        }
    }

    // == Derived Values ==
    /// Deadline used by async retrieval.
    pub fn async_timeout(&self) -> Duration {
        self.time_unit.to_duration(self.timeout)
    }

    /// Transport timeout applied to each store round trip.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Username/password pair, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    // == Validation ==
    /// Checks constraints the store imposes on the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.len() > MAX_KEY_PREFIX_LENGTH {
            return Err(CacheError::Config(format!(
                "keyprefix exceeds {} bytes",
                MAX_KEY_PREFIX_LENGTH
            )));
        }
        if self
            .key_prefix
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(CacheError::Config(
                "keyprefix must not contain whitespace or control characters".to_string(),
            ));
        }
        if self.backend == Backend::Memcached && self.servers.is_empty() {
            return Err(CacheError::Config("no memcached servers configured".to_string()));
        }
        Ok(())
    }
}

// == Time Unit ==
/// Unit of the async retrieval deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Converts `amount` of this unit into a Duration.
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3600)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NANOSECONDS" => Ok(TimeUnit::Nanoseconds),
            "MICROSECONDS" => Ok(TimeUnit::Microseconds),
            "MILLISECONDS" => Ok(TimeUnit::Milliseconds),
            "SECONDS" => Ok(TimeUnit::Seconds),
            "MINUTES" => Ok(TimeUnit::Minutes),
            "HOURS" => Ok(TimeUnit::Hours),
            "DAYS" => Ok(TimeUnit::Days),
            other => Err(format!("unknown time unit '{}'", other)),
        }
    }
}

// == Property Table ==
/// One configurable property: where it is read from and how it lands in [`Config`].
struct Property {
    key: &'static str,
    env: &'static str,
    set: fn(&mut Config, &str) -> std::result::Result<(), String>,
}

impl Property {
    fn apply(&self, config: &mut Config, raw: &str) {
        if let Err(reason) = (self.set)(config, raw.trim()) {
            warn!(
                property = self.key,
                value = raw,
                "Ignoring invalid property ({}), keeping default",
                reason
            );
        }
    }
}

fn parse<T: std::str::FromStr>(raw: &str) -> std::result::Result<T, String>
where
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| e.to_string())
}

fn parse_servers(raw: &str) -> std::result::Result<Vec<String>, String> {
    let servers: Vec<String> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if servers.is_empty() {
        return Err("empty server list".to_string());
    }
    for server in &servers {
        let (host, port) = server
            .rsplit_once(':')
            .ok_or_else(|| format!("'{}' is not host:port", server))?;
        if host.is_empty() {
            return Err(format!("'{}' has no host", server));
        }
        port.parse::<u16>()
            .map_err(|_| format!("'{}' has an invalid port", server))?;
    }
    Ok(servers)
}

fn non_empty(raw: &str) -> std::result::Result<String, String> {
    if raw.is_empty() {
        Err("empty value".to_string())
    } else {
        Ok(raw.to_string())
    }
}

const PROPERTIES: &[Property] = &[
    Property {
        key: "keyprefix",
        env: "GROUP_CACHE_KEYPREFIX",
        set: |c, v| {
            c.key_prefix = v.to_string();
            Ok(())
        },
    },
    Property {
        key: "expiration",
        env: "GROUP_CACHE_EXPIRATION",
        set: |c, v| {
            c.expiration = parse(v)?;
            Ok(())
        },
    },
    Property {
        key: "timeout",
        env: "GROUP_CACHE_TIMEOUT",
        set: |c, v| {
            c.timeout = parse(v)?;
            Ok(())
        },
    },
    Property {
        key: "timeunit",
        env: "GROUP_CACHE_TIMEUNIT",
        set: |c, v| {
            c.time_unit = v.parse()?;
            Ok(())
        },
    },
    Property {
        key: "asyncget",
        env: "GROUP_CACHE_ASYNCGET",
        set: |c, v| {
            c.async_get = parse(v)?;
            Ok(())
        },
    },
    Property {
        key: "compression",
        env: "GROUP_CACHE_COMPRESSION",
        set: |c, v| {
            c.compression = parse(v)?;
            Ok(())
        },
    },
    Property {
        key: "servers",
        env: "GROUP_CACHE_SERVERS",
        set: |c, v| {
            c.servers = parse_servers(v)?;
            Ok(())
        },
    },
    Property {
        key: "username",
        env: "GROUP_CACHE_USERNAME",
        set: |c, v| {
            c.username = Some(non_empty(v)?);
            Ok(())
        },
    },
    Property {
        key: "password",
        env: "GROUP_CACHE_PASSWORD",
        set: |c, v| {
            c.password = Some(non_empty(v)?);
            Ok(())
        },
    },
    Property {
        key: "optimeout",
        env: "GROUP_CACHE_OPTIMEOUT",
        set: |c, v| {
            c.operation_timeout_ms = parse(v)?;
            Ok(())
        },
    },
    Property {
        key: "backend",
        env: "GROUP_CACHE_BACKEND",
        set: |c, v| {
            c.backend = match v.to_ascii_lowercase().as_str() {
                "memcached" => Backend::Memcached,
                "memory" => Backend::Memory,
                other => return Err(format!("unknown backend '{}'", other)),
            };
            Ok(())
        },
    },
    Property {
        key: "port",
        env: "GROUP_CACHE_PORT",
        set: |c, v| {
            c.server_port = parse(v)?;
            Ok(())
        },
    },
    Property {
        key: "cleanupinterval",
        env: "GROUP_CACHE_CLEANUP_INTERVAL",
        set: |c, v| {
            c.cleanup_interval = parse(v)?;
            Ok(())
        },
    },
];
