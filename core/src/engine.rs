use crate::analyzer::{Analyzer, StandardAnalyzer};
use crate::error::{Result, SearchError};
use crate::executor::{SearchExecutor, SearchHit, SearchLimits};
use crate::persist::{load_meta, IndexPaths};
use crate::planner::QueryPlanner;
use crate::snippet::{SnippetExtractor, DEFAULT_MAX_CHARS};
use crate::store::IndexReader;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub per_variant_limit: usize,
    pub total_limit: usize,
    pub snippet_max_chars: usize,
    pub highlight_open: String,
    pub highlight_close: String,
    pub ellipsis: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let limits = SearchLimits::default();
        Self {
            per_variant_limit: limits.per_variant_limit,
            total_limit: limits.total_limit,
            snippet_max_chars: DEFAULT_MAX_CHARS,
            highlight_open: "<em>".into(),
            highlight_close: "</em>".into(),
            ellipsis: "...".into(),
        }
    }
}

impl SearchConfig {
    pub fn limits(&self) -> SearchLimits {
        SearchLimits { per_variant_limit: self.per_variant_limit, total_limit: self.total_limit }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub original_query: String,
    pub suggestions_used: Vec<String>,
    pub hits: Vec<SearchHit>,
}

/// Planner, executor and snippet extractor wired to one open index with one
/// analyzer.
pub struct SearchEngine {
    config: SearchConfig,
    planner: QueryPlanner,
    executor: SearchExecutor,
}

impl SearchEngine {
    /// Opens the index at `root` with the analyzer recorded in its metadata.
    pub fn open<P: AsRef<Path>>(root: P, config: SearchConfig) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let meta = load_meta(&paths)
            .map_err(|e| SearchError::startup_fatal(&paths.root, format!("unreadable meta.json: {e}")))?;
        let analyzer: StandardAnalyzer = meta
            .analyzer
            .parse()
            .map_err(|e: String| SearchError::startup_fatal(&paths.root, e))?;
        Self::with_analyzer(&paths.root, Arc::new(analyzer), config)
    }

    pub fn with_analyzer<P: AsRef<Path>>(root: P, analyzer: Arc<dyn Analyzer>, config: SearchConfig) -> Result<Self> {
        let index = Arc::new(IndexReader::open(root, analyzer.as_ref())?);
        let snippets = SnippetExtractor::new(analyzer.clone(), config.snippet_max_chars)
            .with_markers(config.highlight_open.clone(), config.highlight_close.clone())
            .with_ellipsis(config.ellipsis.clone());
        Ok(Self {
            planner: QueryPlanner::new(analyzer.clone()),
            executor: SearchExecutor::new(index, analyzer, snippets),
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig { &self.config }
    pub fn index(&self) -> &IndexReader { self.executor.index() }
    pub fn document_count(&self) -> usize { self.index().document_count() }

    pub fn search<S: AsRef<str>>(&self, raw_query: &str, suggestions: &[S]) -> Result<SearchOutcome> {
        let plan = self.planner.plan(raw_query, suggestions);
        let hits = self.executor.search(&plan.variants, self.config.limits())?;
        tracing::info!(query = raw_query, variants = plan.variants.len(), hits = hits.len(), "search complete");
        Ok(SearchOutcome { original_query: raw_query.to_string(), suggestions_used: plan.suggestions_used(), hits })
    }
}
