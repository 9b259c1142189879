//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{CacheStats, HybridCache};
use crate::error::{CacheError, Result};
use crate::models::{
    ClearRequest, GetResponse, HasResponse, HealthResponse, InvalidateRequest, KeyResponse,
    RemovedResponse, SetRequest,
};

/// Application state shared across all handlers.
///
/// The cache is internally synchronized; cloning the state shares it.
#[derive(Clone)]
pub struct AppState {
    pub cache: HybridCache<Value>,
}

impl AppState {
    pub fn new(cache: HybridCache<Value>) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<KeyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let options = req.options();
    state.cache.set(req.key.clone(), req.value, options).await;

    Ok(Json(KeyResponse::stored(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<HasResponse> {
    let exists = state.cache.has(&key);
    Json(HasResponse { key, exists })
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    if state.cache.delete(&key).await {
        Ok(Json(KeyResponse::deleted(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for POST /clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> Json<RemovedResponse> {
    let removed = state.cache.clear(req.pattern.as_deref()).await;
    Json(RemovedResponse { removed })
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<RemovedResponse>> {
    if req.tags.is_empty() {
        return Err(CacheError::InvalidRequest(
            "At least one tag is required".to_string(),
        ));
    }
    let removed = state.cache.invalidate(req.tags.as_slice()).await;
    Ok(Json(RemovedResponse { removed }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use serde_json::json;

    fn state() -> AppState {
        AppState::new(HybridCache::new(CacheConfig::default()))
    }

    fn set_request(key: &str, value: Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl: None,
            priority: None,
            compress: None,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = state();

        let req = set_request("test_key", json!({"name": "test_value"}));
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(State(state), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"name": "test_value"}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let result = get_handler(State(state()), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_has_handler() {
        let state = state();
        set_handler(State(state.clone()), Json(set_request("k", json!(1))))
            .await
            .unwrap();

        assert!(has_handler(State(state.clone()), Path("k".to_string())).await.exists);
        assert!(!has_handler(State(state), Path("other".to_string())).await.exists);
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = state();
        set_handler(State(state.clone()), Json(set_request("to_delete", json!("v"))))
            .await
            .unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_handler_with_pattern() {
        let state = state();
        for key in ["voice:1", "voice:2", "user:1"] {
            set_handler(State(state.clone()), Json(set_request(key, json!(key))))
                .await
                .unwrap();
        }

        let req = ClearRequest {
            pattern: Some("voice".to_string()),
        };
        let response = clear_handler(State(state.clone()), Json(req)).await;
        assert_eq!(response.removed, 2);
        assert_eq!(state.cache.size(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let state = state();
        set_handler(
            State(state.clone()),
            Json(set_request("doc:1", json!({"tags": ["news"]}))),
        )
        .await
        .unwrap();

        let req = InvalidateRequest {
            tags: vec!["news".to_string()],
        };
        let response = invalidate_handler(State(state.clone()), Json(req))
            .await
            .unwrap();
        assert_eq!(response.removed, 1);

        let empty = InvalidateRequest { tags: Vec::new() };
        assert!(invalidate_handler(State(state), Json(empty)).await.is_err());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(state())).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
        assert_eq!(response.compression_ratio, 1.0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let req = set_request("", json!("value"));
        let result = set_handler(State(state()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
