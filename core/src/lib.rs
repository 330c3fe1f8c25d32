//! Full-text search over a stored corpus: analysis, a persisted inverted
//! index, multi-variant query execution and highlighted snippets.

pub mod analyzer;
pub mod builder;
pub mod engine;
pub mod error;
pub mod executor;
pub mod index;
pub mod persist;
pub mod planner;
pub mod snippet;
pub mod store;

pub use analyzer::{Analyzer, StandardAnalyzer, Token};
pub use builder::{build, BuildStats, IndexBuilder};
pub use engine::{SearchConfig, SearchEngine, SearchOutcome};
pub use error::{Result, SearchError};
pub use executor::{SearchExecutor, SearchHit, SearchLimits};
pub use index::{DocId, DocMeta, Document, Posting, TermId};
pub use planner::{QueryPlan, QueryPlanner, QueryVariant, VariantOrigin};
pub use snippet::SnippetExtractor;
pub use store::IndexReader;
