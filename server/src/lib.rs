use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use owtsearch_core::{SearchConfig, SearchEngine, SearchOutcome};
use owtsearch_expander::{expand_or_empty, QueryExpander};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub original_query: String,
    pub refined_queries: Vec<String>,
    pub documents: Vec<DocumentHit>,
}

#[derive(Serialize)]
pub struct DocumentHit {
    pub path: String,
    pub score: f32,
    pub snippet: String,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            original_query: outcome.original_query,
            refined_queries: outcome.suggestions_used,
            documents: outcome
                .hits
                .into_iter()
                .map(|h| DocumentHit { path: h.identifier, score: h.score, snippet: h.snippet })
                .collect(),
        }
    }
}

/// Failures surfaced to clients. Details stay in the logs.
#[derive(Debug)]
pub enum ApiError {
    MissingQuery,
    IndexUnavailable,
    SearchFailed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingQuery => (StatusCode::BAD_REQUEST, "Query not provided."),
            ApiError::IndexUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "Index is not available."),
            ApiError::SearchFailed => (StatusCode::INTERNAL_SERVER_ERROR, "An error occurred during search."),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Option<Arc<SearchEngine>>,
    pub expander: Arc<dyn QueryExpander>,
    pub expansion_timeout: Duration,
}

impl AppState {
    pub fn new(engine: SearchEngine, expander: Arc<dyn QueryExpander>, expansion_timeout: Duration) -> Self {
        Self { engine: Some(Arc::new(engine)), expander, expansion_timeout }
    }

    /// State for a server that has no index; `/search` answers 503.
    pub fn without_index(expander: Arc<dyn QueryExpander>, expansion_timeout: Duration) -> Self {
        Self { engine: None, expander, expansion_timeout }
    }

    /// Opens the index at `index_dir`. Errors here must stop the process.
    pub fn open<P: AsRef<Path>>(
        index_dir: P,
        config: SearchConfig,
        expander: Arc<dyn QueryExpander>,
        expansion_timeout: Duration,
    ) -> Result<Self> {
        let engine = SearchEngine::open(index_dir, config)?;
        Ok(Self::new(engine, expander, expansion_timeout))
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
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
        .route("/stats", get(stats_handler))
        .route("/search", get(search_get).post(search_post))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_post(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = payload.ok().and_then(|Json(req)| req.query);
    run_search(state, query).await
}

pub async fn search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    run_search(state, params.q).await
}

async fn run_search(state: AppState, query: Option<String>) -> Result<Json<SearchResponse>, ApiError> {
    let engine = state.engine.clone().ok_or(ApiError::IndexUnavailable)?;
    // a blank query has no tokens of its own but may still gain suggestions
    let query = query.filter(|q| !q.is_empty()).ok_or(ApiError::MissingQuery)?;
    tracing::info!(query = %query, "new search");

    let suggestions = expand_or_empty(state.expander.as_ref(), &query, state.expansion_timeout).await;

    let outcome = tokio::task::spawn_blocking(move || engine.search(&query, suggestions.as_slice()))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "search task failed");
            ApiError::SearchFailed
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "search failed");
            ApiError::SearchFailed
        })?;
    Ok(Json(outcome.into()))
}

async fn stats_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = state.engine.as_ref().ok_or(ApiError::IndexUnavailable)?;
    let meta = engine.index().meta();
    Ok(Json(serde_json::json!({
        "documents": engine.document_count(),
        "terms": meta.num_terms,
        "analyzer": meta.analyzer,
        "created_at": meta.created_at,
    })))
}
