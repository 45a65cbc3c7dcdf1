use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ranking::persist::load_snapshot;
use ranking::{MemoryStore, RankError, RankRequest, Ranker, RankerConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub strategy: Option<String>,
    #[serde(default, rename = "and")]
    pub and_query: String,
    #[serde(default, rename = "not")]
    pub not_query: String,
    #[serde(default)]
    pub phrase: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub strategy: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub score: f64,
    pub url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub ranker: Arc<Ranker>,
    pub store: Arc<MemoryStore>,
}

/// Ranking failures as HTTP responses with a JSON `{"error": ...}` body.
pub struct ApiError(pub RankError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            // Nothing searchable is an empty result, not a failure.
            RankError::InvalidQuery(_) => {
                let body = serde_json::json!({ "error": self.0.to_string(), "total_hits": 0, "results": [] });
                return (StatusCode::OK, Json(body)).into_response();
            }
            RankError::UnknownStrategy(_) => StatusCode::BAD_REQUEST,
            RankError::StoreUnavailable(_) | RankError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            RankError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn build_app(index_path: &str, config: RankerConfig) -> Result<Router> {
    let store = Arc::new(load_snapshot(index_path)?);
    Ok(build_app_with_store(store, config))
}

pub fn build_app_with_store(store: Arc<MemoryStore>, config: RankerConfig) -> Router {
    let ranker = Arc::new(Ranker::new(store.clone(), config));
    let app_state = AppState { ranker, store };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let config = state.ranker.config();
    let strategy = params
        .strategy
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| config.default_strategy.to_string());
    let k = params.k.max(1).min(config.result_limit);
    let req = RankRequest::new(params.q.clone())
        .with_strategy(strategy.clone())
        .with_and(params.and_query)
        .with_not(params.not_query)
        .with_phrase(params.phrase)
        .with_limit(k);

    let results = match state.ranker.search(&req).await {
        Ok(results) => results,
        Err(RankError::InvalidQuery(_)) => Vec::new(),
        Err(e) => return Err(ApiError(e)),
    };

    let results: Vec<SearchHit> = results
        .into_iter()
        .map(|r| SearchHit { doc_id: r.id, score: r.score, url: r.url })
        .collect();
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        strategy,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Response {
    match state.store.document(doc_id) {
        Some(meta) => Json(serde_json::json!({
            "doc_id": doc_id,
            "url": meta.url,
            "length": meta.length,
        }))
        .into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))).into_response(),
    }
}
