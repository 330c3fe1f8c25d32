use crate::analyzer::Analyzer;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantOrigin {
    Original,
    Suggested,
}

/// One phrasing of the user's request, executed as one sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryVariant {
    pub text: String,
    pub origin: VariantOrigin,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryPlan {
    pub variants: Vec<QueryVariant>,
}

impl QueryPlan {
    pub fn original(&self) -> Option<&QueryVariant> {
        self.variants.first().filter(|v| v.origin == VariantOrigin::Original)
    }

    /// Suggestions that survived planning, in the order they were received.
    pub fn suggestions_used(&self) -> Vec<String> {
        self.variants
            .iter()
            .filter(|v| v.origin == VariantOrigin::Suggested)
            .map(|v| v.text.clone())
            .collect()
    }
}

/// Turns a raw query plus externally suggested phrasings into query variants.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    analyzer: Arc<dyn Analyzer>,
}

impl QueryPlanner {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self { Self { analyzer } }

    /// The raw query always comes first, even when it has no tokens. A
    /// suggestion is kept only if it has tokens and its token set differs
    /// from every variant planned before it.
    pub fn plan<S: AsRef<str>>(&self, raw_query: &str, suggestions: &[S]) -> QueryPlan {
        let mut seen: Vec<BTreeSet<String>> = Vec::new();
        let original_terms: BTreeSet<String> = self.analyzer.terms(raw_query).into_iter().collect();
        if !original_terms.is_empty() {
            seen.push(original_terms);
        }
        let mut variants = vec![QueryVariant { text: raw_query.to_string(), origin: VariantOrigin::Original }];

        for suggestion in suggestions {
            let text = suggestion.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            let terms: BTreeSet<String> = self.analyzer.terms(text).into_iter().collect();
            if terms.is_empty() {
                tracing::debug!(suggestion = text, "dropping suggestion without tokens");
                continue;
            }
            if seen.contains(&terms) {
                tracing::debug!(suggestion = text, "dropping suggestion equivalent to an earlier variant");
                continue;
            }
            seen.push(terms);
            variants.push(QueryVariant { text: text.to_string(), origin: VariantOrigin::Suggested });
        }
        QueryPlan { variants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::StandardAnalyzer;

    fn planner() -> QueryPlanner { QueryPlanner::new(Arc::new(StandardAnalyzer::new())) }

    #[test]
    fn empty_and_duplicate_suggestions_are_dropped() {
        let plan = planner().plan("quick dog", &["", "quick dog"]);
        assert_eq!(plan.variants.len(), 1);
        assert_eq!(plan.variants[0].text, "quick dog");
        assert!(plan.suggestions_used().is_empty());
    }

    #[test]
    fn equivalent_phrasings_count_as_duplicates() {
        let plan = planner().plan("Quick dog", &["the DOG, quick!", "lazy dogs", "dog lazy"]);
        assert_eq!(plan.suggestions_used(), vec!["lazy dogs"]);
    }

    #[test]
    fn original_stays_first_even_without_tokens() {
        let plan = planner().plan("the and of", &["  brown fox  ", "of the"]);
        assert_eq!(plan.original().unwrap().text, "the and of");
        assert_eq!(plan.suggestions_used(), vec!["brown fox"]);
    }

    #[test]
    fn suggestions_keep_received_order() {
        let plan = planner().plan("rust", &["memory safety", "borrow checker", "cargo"]);
        assert_eq!(plan.suggestions_used(), vec!["memory safety", "borrow checker", "cargo"]);
    }
}
