use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+(?:['\u{2019}][\p{L}\p{N}]+)*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// A normalized unit of text.
///
/// `start`/`end` are byte offsets of the source word in the analyzed input,
/// `position` is the ordinal of that word among all words of the input
/// (stop words included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: usize,
    pub start: usize,
    pub end: usize,
}

/// Text to token transform shared by indexing, querying and highlighting.
///
/// Implementations must be pure: the same input always yields the same
/// tokens. `name` identifies the configuration and is stored with the index,
/// so an index is only ever queried with the analyzer that built it.
pub trait Analyzer: Send + Sync + fmt::Debug {
    fn analyze(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> String;

    fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }

    /// Terms in first-occurrence order without repeats.
    fn unique_terms(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.terms(text).into_iter().filter(|t| seen.insert(t.clone())).collect()
    }
}

/// NFKC normalization, lowercasing, optional stop-word removal and optional
/// English stemming over words split on non-alphanumeric boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardAnalyzer {
    stopwords: bool,
    stemming: bool,
    min_len: usize,
}

impl Default for StandardAnalyzer {
    fn default() -> Self {
        Self { stopwords: true, stemming: true, min_len: 1 }
    }
}

impl StandardAnalyzer {
    pub fn new() -> Self { Self::default() }

    pub fn with_stopwords(mut self, enabled: bool) -> Self {
        self.stopwords = enabled;
        self
    }

    pub fn with_stemming(mut self, enabled: bool) -> Self {
        self.stemming = enabled;
        self
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len.max(1);
        self
    }

    fn normalize(&self, word: &str) -> Option<String> {
        let lowered = word.nfkc().collect::<String>().to_lowercase().replace('\u{2019}', "'");
        if self.stopwords && STOPWORDS.contains(lowered.as_str()) {
            return None;
        }
        let term = if self.stemming { STEMMER.stem(&lowered).into_owned() } else { lowered };
        if term.chars().count() < self.min_len {
            return None;
        }
        Some(term)
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for (position, mat) in WORD.find_iter(text).enumerate() {
            if let Some(term) = self.normalize(mat.as_str()) {
                tokens.push(Token { text: term, position, start: mat.start(), end: mat.end() });
            }
        }
        tokens
    }

    fn name(&self) -> String {
        format!(
            "standard;stopwords={};stemming={};min_len={}",
            self.stopwords, self.stemming, self.min_len
        )
    }
}

impl FromStr for StandardAnalyzer {
    type Err = String;

    /// Parses the string produced by [`Analyzer::name`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        if parts.next() != Some("standard") {
            return Err(format!("unknown analyzer: {s}"));
        }
        let mut analyzer = StandardAnalyzer::default();
        for part in parts {
            let (key, value) = part.split_once('=').ok_or_else(|| format!("bad analyzer option: {part}"))?;
            match key {
                "stopwords" => analyzer.stopwords = value.parse().map_err(|_| format!("bad stopwords value: {value}"))?,
                "stemming" => analyzer.stemming = value.parse().map_err(|_| format!("bad stemming value: {value}"))?,
                "min_len" => {
                    let n: usize = value.parse().map_err(|_| format!("bad min_len value: {value}"))?;
                    analyzer = analyzer.with_min_len(n);
                }
                _ => return Err(format!("unknown analyzer option: {key}")),
            }
        }
        Ok(analyzer)
    }
}
