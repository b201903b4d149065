//! Response DTOs for the cache HTTP API

use serde::Serialize;
use serde_json::Value;

use crate::client::StatsSnapshot;

/// Response body for `GET /groups/:group/entries/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub group: String,
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(group: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
            value,
        }
    }
}

/// Response body for `PUT /groups/:group/entries/:key`
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    /// Success message
    pub message: String,
    pub group: String,
    pub key: String,
}

impl PutResponse {
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        let group = group.into();
        let key = key.into();
        Self {
            message: format!("Key '{}' stored in group '{}'", key, group),
            group,
            key,
        }
    }
}

/// Response body for `DELETE /groups/:group/entries/:key`
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    /// Success message
    pub message: String,
    pub key: String,
    /// The value the entry held
    pub value: Value,
}

impl RemoveResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' removed", key),
            key,
            value,
        }
    }
}

/// Response body for `DELETE /groups/:group`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub group: String,
    /// Number of member entries deleted
    pub cleared: usize,
}

/// Response body for `GET /groups/:group/members`
#[derive(Debug, Clone, Serialize)]
pub struct MembersResponse {
    pub group: String,
    pub count: usize,
    /// Store keys of the group's entries
    pub keys: Vec<String>,
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(counters: StatsSnapshot) -> Self {
        Self {
            hit_rate: counters.hit_rate(),
            counters,
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
