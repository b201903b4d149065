//! API Handlers
//!
//! HTTP request handlers for each endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Cache, GroupCache};
use crate::client::StoreClient;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, GetResponse, HealthResponse, MembersResponse, PutRequest, PutResponse,
    RemoveResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Store client shared by every group
    pub client: Arc<StoreClient>,
}

impl AppState {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }

    /// Cache bound to `group`.
    fn cache(&self, group: String) -> GroupCache {
        GroupCache::with_client(group, Arc::clone(&self.client))
    }
}

/// Handler for PUT /groups/:group/entries/:key
pub async fn put_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }

    state.cache(group.clone()).put_object(&key, &req.value).await?;

    Ok(Json(PutResponse::new(group, key)))
}

/// Handler for GET /groups/:group/entries/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let value: Option<Value> = state.cache(group.clone()).get_object(&key).await?;
    let value = value.ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(group, key, value)))
}

/// Handler for DELETE /groups/:group/entries/:key
pub async fn remove_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Json<RemoveResponse>> {
    let removed: Option<Value> = state.cache(group).remove_object(&key).await?;
    let value = removed.ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(RemoveResponse::new(key, value)))
}

/// Handler for DELETE /groups/:group
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<ClearResponse>> {
    let cleared = state.cache(group.clone()).clear_group().await?;

    Ok(Json(ClearResponse {
        group,
        cleared: cleared.len(),
    }))
}

/// Handler for GET /groups/:group/members
pub async fn members_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<MembersResponse>> {
    let members = state.cache(group.clone()).members().await?;

    Ok(Json(MembersResponse {
        group,
        count: members.len(),
        keys: members.into_iter().collect(),
    }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.client.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn state() -> AppState {
        let client = StoreClient::new(Arc::new(MemoryStore::new()), &Config::default());
        AppState::new(Arc::new(client))
    }

    fn path(group: &str, key: &str) -> Path<(String, String)> {
        Path((group.to_string(), key.to_string()))
    }

    #[tokio::test]
    async fn test_put_and_get_handler() {
        let state = state();

        let req = PutRequest {
            value: json!({"id": 7}),
        };
        let result = put_handler(State(state.clone()), path("Mapper", "k"), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(State(state), path("Mapper", "k")).await.unwrap();
        assert_eq!(response.value, json!({"id": 7}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let result = get_handler(State(state()), path("Mapper", "missing")).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_handler() {
        let state = state();
        let req = PutRequest { value: json!("v") };
        put_handler(State(state.clone()), path("Mapper", "k"), Json(req))
            .await
            .unwrap();

        let removed = remove_handler(State(state.clone()), path("Mapper", "k"))
            .await
            .unwrap();
        assert_eq!(removed.value, json!("v"));

        let result = get_handler(State(state), path("Mapper", "k")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_and_members_handlers() {
        let state = state();
        for key in ["a", "b", "c"] {
            let req = PutRequest { value: json!(key) };
            put_handler(State(state.clone()), path("Mapper", key), Json(req))
                .await
                .unwrap();
        }

        let members = members_handler(State(state.clone()), Path("Mapper".to_string()))
            .await
            .unwrap();
        assert_eq!(members.count, 3);

        let cleared = clear_handler(State(state.clone()), Path("Mapper".to_string()))
            .await
            .unwrap();
        assert_eq!(cleared.cleared, 3);

        let members = members_handler(State(state), Path("Mapper".to_string()))
            .await
            .unwrap();
        assert_eq!(members.count, 0);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(state())).await;
        assert_eq!(response.counters.hits, 0);
        assert_eq!(response.counters.misses, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
