//! Snippet location inside a rich-content document.
//!
//! Upstream models quote document text without seeing the exact markup, so a
//! verbatim search is not enough: whitespace runs collapse, dashes get
//! re-spelled, inline emphasis tags get stripped, and entities get decoded.
//! `locate` tries an ordered cascade of strategies, strongest first, and the
//! first success wins. No strategy ever guesses: a miss falls through, and a
//! full miss returns `None` so the caller leaves the document untouched.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::markup;

/// Identifies which cascade member located a snippet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Exact,
    Whitespace,
    DashVariant,
    InlineMarkup,
    CaseInsensitive,
    EntityVariant,
    WordBoundary,
    TreeWalk,
}

/// A resolved location for a snippet inside the document.
///
/// Consumed once by the patch applier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedMatch {
    pub strategy: Strategy,
    /// Byte offset of the located occurrence.
    pub start: usize,
    /// Byte offset one past the located occurrence.
    pub end: usize,
    /// Wrap the inline-markup strategy applied to the snippet; the same wrap
    /// must be applied to the replacement text on substitution.
    pub wrap: Option<WrapHint>,
}

/// Inline emphasis wrap recorded by the inline-markup strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapHint {
    /// Index of the first wrapped word.
    pub first_word: usize,
    /// Number of wrapped words (one word or an adjacent pair).
    pub word_count: usize,
    /// Tag name without angle brackets.
    pub tag: String,
}

static DASH_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-\x{2013}\x{2014}]\s*").expect("dash-run pattern"));
static DASH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&ndash;|&mdash;|&#8211;|&#8212;|[-\x{2013}\x{2014}]").expect("dash-token pattern")
});

const DASH_CLASS: &str = r"\s*[-\x{2013}\x{2014}]\s*";
const DASH_OR_ENTITY: &str = r"(?:&ndash;|&mdash;|&#8211;|&#8212;|[-\x{2013}\x{2014}])";
const INLINE_TAGS: [&str; 4] = ["strong", "em", "b", "i"];

/// Finds `snippet` inside `document`, trying each strategy in priority order.
///
/// The first matching text run wins for the tree-walk strategy, and no
/// strategy checks whether the match is unique in the document; one
/// suggestion maps to one location.
pub fn locate(document: &str, snippet: &str) -> Option<LocatedMatch> {
    let snippet = snippet.trim();
    if snippet.is_empty() || document.is_empty() {
        return None;
    }
    let located = exact(document, snippet)
        .or_else(|| whitespace_normalized(document, snippet))
        .or_else(|| dash_variant(document, snippet))
        .or_else(|| inline_markup(document, snippet))
        .or_else(|| case_insensitive(document, snippet))
        .or_else(|| entity_variant(document, snippet))
        .or_else(|| word_boundary(document, snippet))
        .or_else(|| tree_walk(document, snippet));
    match &located {
        Some(hit) => debug!(strategy = ?hit.strategy, start = hit.start, "located snippet"),
        None => debug!(snippet_len = snippet.len(), "snippet not located"),
    }
    located
}

fn located(strategy: Strategy, start: usize, end: usize) -> LocatedMatch {
    LocatedMatch {
        strategy,
        start,
        end,
        wrap: None,
    }
}

fn first_match(strategy: Strategy, document: &str, pattern: &str) -> Option<LocatedMatch> {
    let re = Regex::new(pattern).ok()?;
    re.find(document)
        .map(|m| located(strategy, m.start(), m.end()))
}

/// Strategy 1: exact substring.
fn exact(document: &str, snippet: &str) -> Option<LocatedMatch> {
    document
        .find(snippet)
        .map(|start| located(Strategy::Exact, start, start + snippet.len()))
}

/// Strategy 2: whitespace runs collapse to single spaces for comparison; on a
/// hit the raw document is matched with a flexible-whitespace pattern.
fn whitespace_normalized(document: &str, snippet: &str) -> Option<LocatedMatch> {
    let collapsed_doc = collapse_whitespace(document);
    let collapsed_snippet = collapse_whitespace(snippet);
    if collapsed_snippet.is_empty() || !collapsed_doc.contains(&collapsed_snippet) {
        return None;
    }
    let pattern = snippet
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    first_match(Strategy::Whitespace, document, &pattern)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strategy 3: hyphen, en-dash, and em-dash are interchangeable, with or
/// without surrounding spaces.
fn dash_variant(document: &str, snippet: &str) -> Option<LocatedMatch> {
    if !DASH_RUN.is_match(snippet) {
        return None;
    }
    let pattern = DASH_RUN
        .split(snippet)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(DASH_CLASS);
    first_match(Strategy::DashVariant, document, &pattern)
}

/// Strategy 4: the model may have stripped inline emphasis tags. Try wrapping
/// single words and adjacent word pairs of the snippet in common inline tags;
/// on a hit, carry the same wrap over to the replacement text.
fn inline_markup(document: &str, snippet: &str) -> Option<LocatedMatch> {
    let spans = word_spans(snippet);
    if spans.is_empty() {
        return None;
    }
    for width in [1usize, 2] {
        if spans.len() < width {
            continue;
        }
        for first in 0..=(spans.len() - width) {
            let start = spans[first].0;
            let end = spans[first + width - 1].1;
            for tag in INLINE_TAGS {
                let candidate = wrap_range(snippet, start, end, tag);
                if let Some(at) = document.find(&candidate) {
                    return Some(LocatedMatch {
                        strategy: Strategy::InlineMarkup,
                        start: at,
                        end: at + candidate.len(),
                        wrap: Some(WrapHint {
                            first_word: first,
                            word_count: width,
                            tag: tag.to_string(),
                        }),
                    });
                }
            }
        }
    }
    None
}

fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (at, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(from) = start.take() {
                spans.push((from, at));
            }
        } else if start.is_none() {
            start = Some(at);
        }
    }
    if let Some(from) = start {
        spans.push((from, text.len()));
    }
    spans
}

fn wrap_range(text: &str, start: usize, end: usize, tag: &str) -> String {
    format!(
        "{}<{tag}>{}</{tag}>{}",
        &text[..start],
        &text[start..end],
        &text[end..]
    )
}

/// Applies the wrap recorded by the inline-markup strategy to the replacement
/// text. Falls back to the raw replacement when it has too few words.
pub(crate) fn wrap_replacement(located: &LocatedMatch, replacement: &str) -> Option<String> {
    let hint = located.wrap.as_ref()?;
    let spans = word_spans(replacement);
    if hint.first_word + hint.word_count > spans.len() {
        return None;
    }
    Some(wrap_range(
        replacement,
        spans[hint.first_word].0,
        spans[hint.first_word + hint.word_count - 1].1,
        &hint.tag,
    ))
}

/// Strategy 5: case-insensitive match.
fn case_insensitive(document: &str, snippet: &str) -> Option<LocatedMatch> {
    let re = RegexBuilder::new(&regex::escape(snippet))
        .case_insensitive(true)
        .build()
        .ok()?;
    re.find(document)
        .map(|m| located(Strategy::CaseInsensitive, m.start(), m.end()))
}

/// Strategy 6: dash characters and their named/numeric entity spellings are
/// interchangeable in either direction.
fn entity_variant(document: &str, snippet: &str) -> Option<LocatedMatch> {
    if !DASH_TOKEN.is_match(snippet) {
        return None;
    }
    let mut pattern = String::new();
    let mut last = 0;
    for token in DASH_TOKEN.find_iter(snippet) {
        pattern.push_str(&regex::escape(&snippet[last..token.start()]));
        pattern.push_str(DASH_OR_ENTITY);
        last = token.end();
    }
    pattern.push_str(&regex::escape(&snippet[last..]));
    first_match(Strategy::EntityVariant, document, &pattern)
}

/// Strategy 7: the most permissive non-structural strategy. The snippet is
/// tokenized into words and the document must contain those words in order,
/// separated by flexible non-word runs.
fn word_boundary(document: &str, snippet: &str) -> Option<LocatedMatch> {
    let words: Vec<String> = snippet
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }
    let pattern = format!(r"\b{}\b", words.join(r"\W+"));
    first_match(Strategy::WordBoundary, document, &pattern)
}

/// Strategy 8: walk text runs in document order and find the first run whose
/// entity-decoded text contains the snippet. The located span maps back to
/// raw offsets confined to that single run, so surrounding markup stays
/// untouched.
fn tree_walk(document: &str, snippet: &str) -> Option<LocatedMatch> {
    for run in markup::text_runs(document) {
        let decoded = markup::decode_run(&document[run.start..run.end], run.start);
        if let Some(at) = decoded.text.find(snippet) {
            let (start, end) = decoded.raw_range(at, at + snippet.len());
            return Some(located(Strategy::TreeWalk, start, end));
        }
    }
    None
}
