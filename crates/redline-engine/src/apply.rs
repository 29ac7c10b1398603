//! Patch application: one atomic substitution per located match.
//!
//! A failed locate is ordinary data, never an error; document text
//! legitimately drifts from the model's snapshot. The document is returned
//! unmodified in that case and the caller decides retry/skip/alert.

use crate::locate::{self, LocatedMatch, Strategy};
use crate::suggestion::Suggestion;

/// Outcome of attempting to apply one suggestion.
#[derive(Clone, Debug, PartialEq)]
pub enum ApplyOutcome {
    /// The snippet was located and replaced exactly once.
    Applied { content: String, strategy: Strategy },
    /// No strategy located the snippet; the document was not touched.
    NoMatch,
}

impl ApplyOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Returns the updated content, if any.
    pub fn into_content(self) -> Option<String> {
        match self {
            Self::Applied { content, .. } => Some(content),
            Self::NoMatch => None,
        }
    }
}

/// Splices the replacement into the located occurrence only.
///
/// All occurrences of equivalent text elsewhere in the document are left
/// alone; the match carries one byte range and exactly that range changes.
pub fn apply_located(document: &str, located: &LocatedMatch, replacement: &str) -> String {
    let wrapped = locate::wrap_replacement(located, replacement);
    let replacement = wrapped.as_deref().unwrap_or(replacement);
    let mut updated = String::with_capacity(document.len() + replacement.len());
    updated.push_str(&document[..located.start]);
    updated.push_str(replacement);
    updated.push_str(&document[located.end..]);
    updated
}

/// Locates and applies one suggestion against the current document content.
pub fn apply_suggestion(document: &str, suggestion: &Suggestion) -> ApplyOutcome {
    match locate::locate(document, &suggestion.original) {
        Some(located) => ApplyOutcome::Applied {
            content: apply_located(document, &located, &suggestion.replacement),
            strategy: located.strategy,
        },
        None => ApplyOutcome::NoMatch,
    }
}

/// Result of one entry in an `apply_all` batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    pub id: String,
    /// Winning strategy, or `None` when the suggestion did not match.
    pub strategy: Option<Strategy>,
}

impl BatchEntry {
    pub fn applied(&self) -> bool {
        self.strategy.is_some()
    }
}

/// Applies suggestions as independent sequential single-location applies.
///
/// Never a single multi-location substitution: each suggestion is located
/// against the content produced by the previous apply.
pub fn apply_all(document: &str, suggestions: &[Suggestion]) -> (String, Vec<BatchEntry>) {
    let mut content = document.to_string();
    let mut entries = Vec::with_capacity(suggestions.len());
    for suggestion in suggestions {
        match apply_suggestion(&content, suggestion) {
            ApplyOutcome::Applied {
                content: updated,
                strategy,
            } => {
                content = updated;
                entries.push(BatchEntry {
                    id: suggestion.id.clone(),
                    strategy: Some(strategy),
                });
            }
            ApplyOutcome::NoMatch => entries.push(BatchEntry {
                id: suggestion.id.clone(),
                strategy: None,
            }),
        }
    }
    (content, entries)
}
