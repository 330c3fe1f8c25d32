//! Query expansion through an external language model.
//!
//! Expansion is best effort. [`expand_or_empty`] turns every failure mode
//! (no key configured, network error, bad status, unexpected payload,
//! timeout) into an empty suggestion list so a search never fails because
//! of it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const SYSTEM_PROMPT: &str = "You are an expert search query refinement agent. Your goal is to help a user find \
the most relevant documents from a large text corpus. Based on the user's query, generate a JSON object containing a \
list of three alternative, more specific search queries. Decompose the original query, add synonyms, or rephrase it to \
cover different aspects of the user's intent. The list should be named 'refined_queries'. Return ONLY the JSON object \
and nothing else.";

#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("query expansion is disabled")]
    Disabled,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait QueryExpander: Send + Sync {
    /// Alternative phrasings of `query`, possibly none.
    async fn expand(&self, query: &str) -> Result<Vec<String>, ExpansionError>;
}

/// Used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledExpander;

#[async_trait]
impl QueryExpander for DisabledExpander {
    async fn expand(&self, _query: &str) -> Result<Vec<String>, ExpansionError> {
        Err(ExpansionError::Disabled)
    }
}

/// Answers every query with the same suggestions.
#[derive(Debug, Default, Clone)]
pub struct StaticExpander {
    suggestions: Vec<String>,
}

impl StaticExpander {
    pub fn new<I, S>(suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { suggestions: suggestions.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl QueryExpander for StaticExpander {
    async fn expand(&self, _query: &str) -> Result<Vec<String>, ExpansionError> {
        Ok(self.suggestions.clone())
    }
}

/// Gemini `generateContent` client asking for a `refined_queries` JSON list.
#[derive(Debug, Clone)]
pub struct GeminiExpander {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiExpander {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ExpansionError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }
}

pub fn request_body(query: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": query }] }],
        "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
        "generationConfig": { "responseMimeType": "application/json" }
    })
}

/// Extracts `refined_queries` from a `generateContent` response body.
pub fn parse_refined_queries(body: &Value) -> Result<Vec<String>, ExpansionError> {
    let text = body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| ExpansionError::Malformed("missing candidates[0].content.parts[0].text".into()))?;
    let inner: Value = serde_json::from_str(text).map_err(|e| ExpansionError::Malformed(format!("inner JSON: {e}")))?;
    let Some(list) = inner.get("refined_queries") else {
        return Ok(Vec::new());
    };
    let items = list
        .as_array()
        .ok_or_else(|| ExpansionError::Malformed(format!("refined_queries is not a list: {list}")))?;
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ExpansionError::Malformed(format!("refined_queries holds non-strings: {list}")))
}

#[async_trait]
impl QueryExpander for GeminiExpander {
    async fn expand(&self, query: &str) -> Result<Vec<String>, ExpansionError> {
        let resp = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(query))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ExpansionError::Status(resp.status()));
        }
        let body: Value = resp.json().await?;
        parse_refined_queries(&body)
    }
}

/// Runs `expander` with a deadline. Any failure yields no suggestions.
pub async fn expand_or_empty(expander: &dyn QueryExpander, query: &str, timeout: Duration) -> Vec<String> {
    let result = match tokio::time::timeout(timeout, expander.expand(query)).await {
        Ok(result) => result,
        Err(_) => Err(ExpansionError::Timeout(timeout)),
    };
    match result {
        Ok(suggestions) => {
            tracing::info!(query, suggestions = ?suggestions, "query expanded");
            suggestions
        }
        Err(ExpansionError::Disabled) => {
            tracing::debug!("query expansion disabled, searching with the original query only");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(query, error = %e, "query expansion unavailable, continuing without suggestions");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn parses_refined_queries() {
        let body = wrap(r#"{"refined_queries": ["solar panel efficiency", "photovoltaic cells"]}"#);
        assert_eq!(parse_refined_queries(&body).unwrap(), vec!["solar panel efficiency", "photovoltaic cells"]);
    }

    #[test]
    fn missing_list_means_no_suggestions() {
        assert!(parse_refined_queries(&wrap(r#"{"other": 1}"#)).unwrap().is_empty());
    }

    #[test]
    fn rejects_unexpected_shapes() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            wrap("not json"),
            wrap(r#"{"refined_queries": "one string"}"#),
            wrap(r#"{"refined_queries": ["ok", 3]}"#),
        ] {
            assert!(matches!(parse_refined_queries(&body), Err(ExpansionError::Malformed(_))), "{body}");
        }
    }

    #[test]
    fn request_carries_query_and_prompt() {
        let body = request_body("rust async");
        assert_eq!(body.pointer("/contents/0/parts/0/text").unwrap(), "rust async");
        assert_eq!(body.pointer("/generationConfig/responseMimeType").unwrap(), "application/json");
        assert!(body.pointer("/systemInstruction/parts/0/text").unwrap().as_str().unwrap().contains("refined_queries"));
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let g = GeminiExpander::new("k").unwrap().with_endpoint("http://localhost:9/models/").with_model("m");
        assert_eq!(g.url(), "http://localhost:9/models/m:generateContent");
    }
}
