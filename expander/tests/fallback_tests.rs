use async_trait::async_trait;
use owtsearch_expander::{
    expand_or_empty, DisabledExpander, ExpansionError, GeminiExpander, QueryExpander, StaticExpander,
};
use std::time::Duration;

struct SlowExpander;

#[async_trait]
impl QueryExpander for SlowExpander {
    async fn expand(&self, _query: &str) -> Result<Vec<String>, ExpansionError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(vec!["too late".into()])
    }
}

struct BrokenExpander;

#[async_trait]
impl QueryExpander for BrokenExpander {
    async fn expand(&self, _query: &str) -> Result<Vec<String>, ExpansionError> {
        Err(ExpansionError::Malformed("garbage".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_yields_no_suggestions() {
    let out = expand_or_empty(&SlowExpander, "query", Duration::from_secs(5)).await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn errors_yield_no_suggestions() {
    assert!(expand_or_empty(&BrokenExpander, "query", Duration::from_secs(1)).await.is_empty());
    assert!(expand_or_empty(&DisabledExpander, "query", Duration::from_secs(1)).await.is_empty());
}

#[tokio::test]
async fn unreachable_service_yields_no_suggestions() {
    // nothing listens on port 9 (discard) in the test environment
    let gemini = GeminiExpander::new("test-key").unwrap().with_endpoint("http://127.0.0.1:9/v1beta/models");
    assert!(expand_or_empty(&gemini, "query", Duration::from_secs(5)).await.is_empty());
}

#[tokio::test]
async fn successful_expansion_is_returned() {
    let expander = StaticExpander::new(["a", "b"]);
    assert_eq!(expand_or_empty(&expander, "query", Duration::from_secs(1)).await, vec!["a", "b"]);
}
