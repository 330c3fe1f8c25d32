//! Multi-variant query execution.
//!
//! Each variant runs as a disjunctive BM25 query. Results are merged
//! first-seen-wins: the score a document gets from the earliest variant
//! (and earliest rank within it) is final, later variants never re-score it.

use crate::analyzer::Analyzer;
use crate::error::{Result, SearchError};
use crate::index::DocId;
use crate::planner::QueryVariant;
use crate::snippet::SnippetExtractor;
use crate::store::IndexReader;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    pub per_variant_limit: usize,
    pub total_limit: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self { per_variant_limit: 10, total_limit: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub identifier: String,
    pub score: f32,
    pub snippet: String,
}

/// A scored document before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDoc {
    pub doc_id: DocId,
    pub identifier: String,
    pub score: f32,
}

/// Score descending, then identifier ascending.
fn rank_order(a_score: f32, a_id: &str, b_score: f32, b_id: &str) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_id.cmp(b_id))
}

pub struct SearchExecutor {
    index: Arc<IndexReader>,
    analyzer: Arc<dyn Analyzer>,
    snippets: SnippetExtractor,
}

impl SearchExecutor {
    pub fn new(index: Arc<IndexReader>, analyzer: Arc<dyn Analyzer>, snippets: SnippetExtractor) -> Self {
        Self { index, analyzer, snippets }
    }

    pub fn index(&self) -> &IndexReader { &self.index }

    fn idf(&self, df: u32) -> f32 {
        let n = self.index.document_count() as f32;
        let df = df as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Runs one disjunctive query over `tokens` and returns at most `limit`
    /// documents, best first. `tokens` must be analyzer output (stemmed,
    /// lowercased terms), not raw query words.
    pub fn run_variant(&self, tokens: &[String], limit: usize) -> Result<Vec<RankedDoc>> {
        if limit == 0 || tokens.is_empty() {
            return Ok(Vec::new());
        }
        let avg_len = self.index.average_doc_len().max(1.0);
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        for token in tokens {
            let postings = self.index.postings(token)?;
            if postings.is_empty() {
                continue;
            }
            let idf = self.idf(postings.len() as u32);
            for p in postings {
                let doc_len = match self.index.doc_meta(p.doc_id) {
                    Ok(meta) => meta.num_tokens as f32,
                    Err(e @ SearchError::NotFound(_)) => {
                        tracing::error!(token = %token, error = %e, "posting refers to a missing document");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let tf = p.tf as f32;
                let norm = K1 * (1.0 - B + B * doc_len / avg_len);
                *scores.entry(p.doc_id).or_insert(0.0) += idf * tf * (K1 + 1.0) / (tf + norm);
            }
        }

        let mut ranked = Vec::with_capacity(scores.len());
        for (doc_id, score) in scores {
            let identifier = self.index.identifier(doc_id)?.to_string();
            ranked.push(RankedDoc { doc_id, identifier, score });
        }
        let cmp = |a: &RankedDoc, b: &RankedDoc| rank_order(a.score, &a.identifier, b.score, &b.identifier);
        if ranked.len() > limit {
            ranked.select_nth_unstable_by(limit - 1, cmp);
            ranked.truncate(limit);
        }
        ranked.sort_by(cmp);
        Ok(ranked)
    }

    /// Executes every variant and returns merged, ranked, highlighted hits.
    ///
    /// Snippets highlight the original query's tokens plus those of the
    /// variant that first surfaced the document.
    pub fn search(&self, variants: &[QueryVariant], limits: SearchLimits) -> Result<Vec<SearchHit>> {
        let mut seen: HashSet<DocId> = HashSet::new();
        let mut merged: Vec<(RankedDoc, usize)> = Vec::new();
        let mut variant_tokens: Vec<Vec<String>> = Vec::with_capacity(variants.len());

        for (i, variant) in variants.iter().enumerate() {
            let tokens = self.analyzer.unique_terms(&variant.text);
            if tokens.is_empty() {
                let err = SearchError::MalformedVariant(variant.text.clone());
                tracing::debug!(error = %err, "skipping variant");
                variant_tokens.push(tokens);
                continue;
            }
            let ranked = self.run_variant(&tokens, limits.per_variant_limit)?;
            tracing::debug!(variant = %variant.text, hits = ranked.len(), "variant executed");
            for doc in ranked {
                if seen.insert(doc.doc_id) {
                    merged.push((doc, i));
                }
            }
            variant_tokens.push(tokens);
        }

        merged.sort_by(|(a, _), (b, _)| rank_order(a.score, &a.identifier, b.score, &b.identifier));
        merged.truncate(limits.total_limit);

        let original: HashSet<String> = variant_tokens.first().cloned().unwrap_or_default().into_iter().collect();
        let mut hits = Vec::with_capacity(merged.len());
        for (doc, variant) in merged {
            let content = match self.index.content(&doc.identifier) {
                Ok(content) => content,
                Err(e @ SearchError::NotFound(_)) => {
                    tracing::error!(identifier = %doc.identifier, error = %e, "indexed document has no stored content");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let mut highlight = original.clone();
            highlight.extend(variant_tokens[variant].iter().cloned());
            let snippet = self.snippets.extract(content, &highlight);
            hits.push(SearchHit { identifier: doc.identifier, score: doc.score, snippet });
        }
        Ok(hits)
    }
}
