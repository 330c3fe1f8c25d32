use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use owtsearch_core::{build, Document, SearchConfig, StandardAnalyzer};
use owtsearch_expander::{DisabledExpander, ExpansionError, QueryExpander, StaticExpander};
use owtsearch_server::{build_app, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

struct FailingExpander;

#[async_trait]
impl QueryExpander for FailingExpander {
    async fn expand(&self, _query: &str) -> Result<Vec<String>, ExpansionError> {
        Err(ExpansionError::Malformed("unexpected payload".into()))
    }
}

fn build_tiny_index() -> TempDir {
    let dir = tempdir().unwrap();
    let docs = vec![
        Document::new("archive-1.xz/0001.txt", "Rust is great. rust systems programming."),
        Document::new("archive-1.xz/0002.txt", "Learning rust."),
        Document::new("archive-2.xz/0001.txt", "The quick brown fox"),
        Document::new("archive-2.xz/0002.txt", "The lazy dog sleeps."),
    ];
    build(dir.path().join("indexdir"), Arc::new(StandardAnalyzer::new()), docs).unwrap();
    dir
}

fn app(dir: &TempDir, expander: Arc<dyn QueryExpander>) -> Router {
    let state =
        AppState::open(dir.path().join("indexdir"), SearchConfig::default(), expander, Duration::from_secs(2)).unwrap();
    build_app(state)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn post(query: &Value) -> Request<Body> {
    Request::post("/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(query.to_string()))
        .unwrap()
}

fn paths(json: &Value) -> Vec<String> {
    json["documents"].as_array().unwrap().iter().map(|d| d["path"].as_str().unwrap().to_string()).collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = build_tiny_index();
    let (status, json) = call(app(&dir, Arc::new(DisabledExpander)), Request::get("/search?q=rust").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["original_query"], "rust");
    assert_eq!(paths(&json), vec!["archive-1.xz/0001.txt", "archive-1.xz/0002.txt"]);
    let first = &json["documents"][0];
    assert!(first["snippet"].as_str().unwrap().contains("<em>Rust</em>"));
    assert!(first["score"].as_f64().unwrap() > json["documents"][1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn post_search_reports_used_suggestions() {
    let dir = build_tiny_index();
    let expander = StaticExpander::new(["", "quick fox", "lazy dog", "LAZY dogs"]);
    let (status, json) = call(app(&dir, Arc::new(expander)), post(&serde_json::json!({ "query": "quick fox" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["refined_queries"], serde_json::json!(["lazy dog"]));
    assert_eq!(paths(&json), vec!["archive-2.xz/0001.txt", "archive-2.xz/0002.txt"]);
}

#[tokio::test]
async fn failing_expansion_still_answers() {
    let dir = build_tiny_index();
    let (status, json) = call(app(&dir, Arc::new(FailingExpander)), post(&serde_json::json!({ "query": "lazy" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["refined_queries"], serde_json::json!([]));
    assert_eq!(paths(&json), vec!["archive-2.xz/0002.txt"]);
}

#[tokio::test]
async fn blank_query_is_answered_through_suggestions() {
    let dir = build_tiny_index();
    let expander = StaticExpander::new(["lazy dog"]);
    let (status, json) = call(app(&dir, Arc::new(expander)), post(&serde_json::json!({ "query": "   " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["original_query"], "   ");
    assert_eq!(json["refined_queries"], serde_json::json!(["lazy dog"]));
    assert_eq!(paths(&json), vec!["archive-2.xz/0002.txt"]);

    let (status, _) = call(app(&dir, Arc::new(DisabledExpander)), post(&serde_json::json!({ "query": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_results_is_an_empty_list() {
    let dir = build_tiny_index();
    let (status, json) = call(app(&dir, Arc::new(DisabledExpander)), post(&serde_json::json!({ "query": "zebra" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_index_is_distinct_from_no_results() {
    let app = build_app(AppState::without_index(Arc::new(DisabledExpander), Duration::from_secs(1)));
    let (status, json) = call(app, post(&serde_json::json!({ "query": "rust" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "Index is not available.");
}

#[tokio::test]
async fn missing_query_is_rejected() {
    let dir = build_tiny_index();
    let (status, json) = call(app(&dir, Arc::new(DisabledExpander)), post(&serde_json::json!({ "q": "rust" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Query not provided.");

    let garbage = Request::post("/search").body(Body::from("not json")).unwrap();
    let (status, _) = call(app(&dir, Arc::new(DisabledExpander)), garbage).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn opening_missing_index_fails() {
    let dir = tempdir().unwrap();
    let state = AppState::open(dir.path().join("indexdir"), SearchConfig::default(), Arc::new(DisabledExpander), Duration::from_secs(1));
    assert!(state.is_err());
}

#[tokio::test]
async fn stats_reports_document_count() {
    let dir = build_tiny_index();
    let (status, json) = call(app(&dir, Arc::new(DisabledExpander)), Request::get("/stats").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["documents"], 4);
}
