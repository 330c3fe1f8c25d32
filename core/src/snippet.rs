//! Highlighted excerpts for search results.

use crate::analyzer::Analyzer;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

pub const DEFAULT_MAX_CHARS: usize = 200;

/// Produces one bounded excerpt per document.
///
/// The excerpt is the first sentence containing a query token, with every
/// matching word wrapped in the emphasis markers. When that sentence is too
/// long a window around its first match is cut out, and when there is no
/// usable match the head of the document is returned instead. The result is
/// never longer than `max_chars` characters, markers included.
#[derive(Debug, Clone)]
pub struct SnippetExtractor {
    analyzer: Arc<dyn Analyzer>,
    max_chars: usize,
    open: String,
    close: String,
    ellipsis: String,
}

impl SnippetExtractor {
    pub fn new(analyzer: Arc<dyn Analyzer>, max_chars: usize) -> Self {
        Self {
            analyzer,
            max_chars: max_chars.max(1),
            open: "<em>".into(),
            close: "</em>".into(),
            ellipsis: "...".into(),
        }
    }

    pub fn with_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open = open.into();
        self.close = close.into();
        self
    }

    pub fn with_ellipsis(mut self, ellipsis: impl Into<String>) -> Self {
        self.ellipsis = ellipsis.into();
        self
    }

    pub fn max_chars(&self) -> usize { self.max_chars }

    pub fn extract(&self, content: &str, query_tokens: &HashSet<String>) -> String {
        if content.is_empty() {
            return String::new();
        }
        if !query_tokens.is_empty() {
            let matches: Vec<Range<usize>> = self
                .analyzer
                .analyze(content)
                .into_iter()
                .filter(|t| query_tokens.contains(&t.text))
                .map(|t| t.start..t.end)
                .collect();
            if let Some(first) = matches.first() {
                let sentence = sentence_bounds(content, first.start);
                let inside: Vec<Range<usize>> = matches
                    .iter()
                    .filter(|m| m.start >= sentence.start && m.end <= sentence.end)
                    .cloned()
                    .collect();
                if let Some(snippet) = self.highlight_sentence(content, sentence, &inside) {
                    return snippet;
                }
            }
        }
        self.fallback(content)
    }

    fn highlight_sentence(&self, content: &str, sentence: Range<usize>, matches: &[Range<usize>]) -> Option<String> {
        let first = matches.first()?.clone();
        let whole = self.render(content, sentence.start, sentence.end, matches);
        if whole.chars().count() <= self.max_chars {
            return Some(whole);
        }

        let context = self.max_chars / 4;
        let start = window_start(content, sentence.start, first.start, context);
        self.render_window(content, start, sentence.clone(), matches)
            .or_else(|| self.render_window(content, first.start, sentence, matches))
    }

    fn render(&self, content: &str, start: usize, end: usize, matches: &[Range<usize>]) -> String {
        let mut out = String::new();
        let mut pos = start;
        for m in matches {
            out.push_str(&content[pos..m.start]);
            out.push_str(&self.open);
            out.push_str(&content[m.clone()]);
            out.push_str(&self.close);
            pos = m.end;
        }
        out.push_str(&content[pos..end]);
        out
    }

    /// Renders `content[start..sentence.end]` into the character budget.
    /// Returns `None` when not even the first match fits.
    fn render_window(&self, content: &str, start: usize, sentence: Range<usize>, matches: &[Range<usize>]) -> Option<String> {
        let ellipsis_len = self.ellipsis.chars().count();
        let marker_len = self.open.chars().count() + self.close.chars().count();
        let mut out = String::new();
        let mut used = 0;
        if start > sentence.start {
            out.push_str(&self.ellipsis);
            used += ellipsis_len;
        }
        // room is always left for a closing ellipsis
        let budget = self.max_chars.checked_sub(ellipsis_len)?;

        let mut pos = start;
        let mut highlighted = 0;
        let mut truncated = false;
        for m in matches.iter().filter(|m| m.start >= start) {
            if !push_plain(&mut out, &mut used, budget, &content[pos..m.start]) {
                truncated = true;
                break;
            }
            let word = &content[m.clone()];
            let cost = marker_len + word.chars().count();
            if used + cost > budget {
                truncated = true;
                break;
            }
            out.push_str(&self.open);
            out.push_str(word);
            out.push_str(&self.close);
            used += cost;
            highlighted += 1;
            pos = m.end;
        }
        if !truncated && !push_plain(&mut out, &mut used, budget, &content[pos..sentence.end]) {
            truncated = true;
        }
        if highlighted == 0 {
            return None;
        }
        if truncated {
            let kept = out.trim_end().len();
            out.truncate(kept);
            out.push_str(&self.ellipsis);
        }
        Some(out)
    }

    fn fallback(&self, content: &str) -> String {
        if content.chars().count() <= self.max_chars {
            return content.to_string();
        }
        let ellipsis_len = self.ellipsis.chars().count();
        if self.max_chars <= ellipsis_len {
            return content.chars().take(self.max_chars).collect();
        }
        let mut out: String = content.chars().take(self.max_chars - ellipsis_len).collect();
        out.push_str(&self.ellipsis);
        out
    }
}

/// Appends as much of `text` as fits; returns false if it was cut.
fn push_plain(out: &mut String, used: &mut usize, budget: usize, text: &str) -> bool {
    for c in text.chars() {
        if *used >= budget {
            return false;
        }
        out.push(c);
        *used += 1;
    }
    true
}

/// Byte range of the sentence containing `pos`, without surrounding
/// whitespace. Sentences end after `.`, `!` or `?` followed by whitespace,
/// and at line breaks.
fn sentence_bounds(content: &str, pos: usize) -> Range<usize> {
    let mut start = 0;
    let mut end = content.len();
    let mut chars = content.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = c == '\n'
            || (matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |&(_, next)| next.is_whitespace()));
        if !boundary {
            continue;
        }
        let after = i + c.len_utf8();
        if after <= pos {
            start = after;
        } else {
            end = if c == '\n' { i } else { after };
            break;
        }
    }
    let s = &content[start..end];
    let lead = s.len() - s.trim_start().len();
    let trail = s.len() - s.trim_end().len();
    (start + lead)..(end - trail).max(start + lead)
}

/// Start of a window that shows up to `context` characters before `anchor`,
/// moved forward to a word start when it lands inside a word.
fn window_start(content: &str, floor: usize, anchor: usize, context: usize) -> usize {
    if context == 0 {
        return anchor;
    }
    let mut start = content[floor..anchor]
        .char_indices()
        .rev()
        .nth(context - 1)
        .map_or(floor, |(i, _)| floor + i);
    if start > floor {
        let mid_word = content[..start].chars().next_back().is_some_and(char::is_alphanumeric);
        if mid_word {
            if let Some(ws) = content[start..anchor].find(char::is_whitespace) {
                start += ws;
            }
        }
        let rest = &content[start..anchor];
        start += rest.len() - rest.trim_start().len();
    }
    start
}
