use owtsearch_core::{Analyzer, StandardAnalyzer};
use proptest::prelude::*;

#[test]
fn it_normalizes_and_stems() {
    let words = StandardAnalyzer::new().terms("Running Runners RUN! The ﬁle menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // NFKC folds the "ﬁ" ligature
    assert!(words.contains(&"file".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = StandardAnalyzer::new().terms("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn keeps_stopwords_when_disabled() {
    let words = StandardAnalyzer::new().with_stopwords(false).with_stemming(false).terms("The dog");
    assert_eq!(words, vec!["the", "dog"]);
}

#[test]
fn curly_apostrophe_matches_straight() {
    let a = StandardAnalyzer::new().with_stemming(false);
    assert!(a.terms("don\u{2019}t stop").iter().all(|t| t != "don't"));
    assert_eq!(a.terms("don\u{2019}t stop"), a.terms("don't stop"));
}

proptest! {
    #[test]
    fn analysis_is_deterministic(s in "\\PC{0,200}") {
        let index_side = StandardAnalyzer::new();
        let query_side: StandardAnalyzer = index_side.name().parse().unwrap();
        prop_assert_eq!(index_side.analyze(&s), index_side.analyze(&s));
        prop_assert_eq!(index_side.analyze(&s), query_side.analyze(&s));
    }

    #[test]
    fn offsets_are_char_boundaries(s in "\\PC{0,200}") {
        for t in StandardAnalyzer::new().analyze(&s) {
            prop_assert!(s.is_char_boundary(t.start) && s.is_char_boundary(t.end));
            prop_assert!(t.start < t.end);
        }
    }
}
