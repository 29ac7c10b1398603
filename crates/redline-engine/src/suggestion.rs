use serde_json::Value;
use tracing::debug;

/// The kind of edit a suggestion proposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Document categorization (no text change of its own).
    Category,
    /// A flagged risk with a proposed rewording.
    Risk,
    /// A jurisdiction-driven clause change.
    JurisdictionChange,
    /// A missing-information question posed to the user.
    Question,
    /// An answer to a previously posed question.
    Answer,
}

impl SuggestionKind {
    /// Maps a wire-payload key (`"risk"`, `"change"`, ...) to a kind.
    pub(crate) fn from_wire_key(key: &str) -> Option<Self> {
        match key {
            "category" => Some(Self::Category),
            "risk" => Some(Self::Risk),
            "change" => Some(Self::JurisdictionChange),
            "question" => Some(Self::Question),
            "answer" => Some(Self::Answer),
            _ => None,
        }
    }
}

/// Applied-state of a suggestion. Transitions happen only via caller action,
/// never from stream events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedState {
    #[default]
    Pending,
    Applied,
    Failed,
    Dismissed,
}

/// One proposed edit accumulated from the stream.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Suggestion {
    /// Session-scoped id: source-provided, else a session-local counter.
    pub id: String,
    pub kind: SuggestionKind,
    /// Snippet the upstream model believes is present in the document.
    pub original: String,
    /// Replacement text proposed for the located snippet.
    pub replacement: String,
    pub rationale: Option<String>,
    pub severity: Option<String>,
    /// Zero-based discovery order within the session.
    pub order: usize,
    pub state: AppliedState,
}

/// Order-preserving accumulator of suggestions for one session.
///
/// Lookups are linear; suggestion counts are small (tens). Arrival order is
/// the canonical snapshot order. Suggestions are never removed during a
/// session, only re-stated or re-flagged.
#[derive(Debug, Default)]
pub struct SuggestionAggregator {
    items: Vec<Suggestion>,
    next_local_id: u64,
}

impl SuggestionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or updates a suggestion from one unit payload.
    ///
    /// Returns a clone of the new/changed suggestion, or `None` when the
    /// payload carries nothing usable. `answer` payloads with a matching
    /// `question_id` update the question in place instead of appending.
    pub fn upsert_unit(&mut self, kind: SuggestionKind, payload: &Value) -> Option<Suggestion> {
        if kind == SuggestionKind::Answer
            && let Some(answered) = self.try_answer_question(payload)
        {
            return Some(answered);
        }

        let fields = UnitFields::from_payload(kind, payload)?;
        let id = match payload_id(payload) {
            Some(id) => id,
            None => {
                let id = format!("local-{}", self.next_local_id);
                self.next_local_id += 1;
                id
            }
        };

        if let Some(existing) = self.items.iter_mut().find(|s| s.id == id) {
            existing.original = fields.original;
            existing.replacement = fields.replacement;
            if fields.rationale.is_some() {
                existing.rationale = fields.rationale;
            }
            if fields.severity.is_some() {
                existing.severity = fields.severity;
            }
            debug!(id = %existing.id, "updated suggestion in place");
            return Some(existing.clone());
        }

        let suggestion = Suggestion {
            id,
            kind,
            original: fields.original,
            replacement: fields.replacement,
            rationale: fields.rationale,
            severity: fields.severity,
            order: self.items.len(),
            state: AppliedState::Pending,
        };
        self.items.push(suggestion.clone());
        Some(suggestion)
    }

    /// Sets the applied-state of a suggestion. Returns `false` for unknown ids.
    pub fn mark(&mut self, id: &str, state: AppliedState) -> bool {
        match self.items.iter_mut().find(|s| s.id == id) {
            Some(suggestion) => {
                suggestion.state = state;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Suggestion> {
        self.items.iter().find(|s| s.id == id)
    }

    /// Returns all suggestions in arrival order.
    pub fn snapshot(&self) -> Vec<Suggestion> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn try_answer_question(&mut self, payload: &Value) -> Option<Suggestion> {
        let question_id = payload_str(payload, &["question_id"])?;
        let answer = payload_str(payload, &["answer", "text"])?;
        let question = self
            .items
            .iter_mut()
            .find(|s| s.kind == SuggestionKind::Question && s.id == question_id)?;
        question.replacement = answer;
        debug!(id = %question.id, "answered question suggestion");
        Some(question.clone())
    }
}

struct UnitFields {
    original: String,
    replacement: String,
    rationale: Option<String>,
    severity: Option<String>,
}

impl UnitFields {
    fn from_payload(kind: SuggestionKind, payload: &Value) -> Option<Self> {
        let rationale = payload_str(payload, &["reasoning", "rationale", "description"]);
        let severity = payload_str(payload, &["severity"]);
        match kind {
            SuggestionKind::Question => {
                let question = payload_str(payload, &["question", "text"])?;
                Some(Self {
                    original: String::new(),
                    replacement: String::new(),
                    rationale: Some(question),
                    severity,
                })
            }
            SuggestionKind::Answer => {
                let answer = payload_str(payload, &["answer", "text"])?;
                Some(Self {
                    original: String::new(),
                    replacement: answer,
                    rationale,
                    severity,
                })
            }
            SuggestionKind::Category => {
                let name = payload_str(payload, &["name", "category", "label"])?;
                Some(Self {
                    original: String::new(),
                    replacement: String::new(),
                    rationale: Some(rationale.unwrap_or(name)),
                    severity,
                })
            }
            SuggestionKind::Risk | SuggestionKind::JurisdictionChange => {
                let original = payload_str(payload, &["original_text", "original", "text"])?;
                let replacement =
                    payload_str(payload, &["suggested_text", "replacement", "suggestion"])
                        .unwrap_or_default();
                Some(Self {
                    original,
                    replacement,
                    rationale,
                    severity,
                })
            }
        }
    }
}

fn payload_id(payload: &Value) -> Option<String> {
    match payload.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn payload_str(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| payload.get(key).and_then(|v| v.as_str()))
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_preserves_arrival_order() {
        let mut agg = SuggestionAggregator::new();
        agg.upsert_unit(
            SuggestionKind::Risk,
            &json!({"id":"r1","original_text":"30 days","suggested_text":"60 days"}),
        )
        .expect("first unit");
        agg.upsert_unit(
            SuggestionKind::Risk,
            &json!({"id":"r2","original_text":"net 15","suggested_text":"net 45"}),
        )
        .expect("second unit");

        let snapshot = agg.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "r1");
        assert_eq!(snapshot[0].order, 0);
        assert_eq!(snapshot[1].id, "r2");
        assert_eq!(snapshot[1].order, 1);
    }

    #[test]
    fn upsert_updates_in_place_without_reordering() {
        let mut agg = SuggestionAggregator::new();
        agg.upsert_unit(
            SuggestionKind::Risk,
            &json!({"id":"r1","original_text":"a","suggested_text":"b"}),
        )
        .expect("insert r1");
        agg.upsert_unit(
            SuggestionKind::Risk,
            &json!({"id":"r2","original_text":"c","suggested_text":"d"}),
        )
        .expect("insert r2");

        let changed = agg
            .upsert_unit(
                SuggestionKind::Risk,
                &json!({"id":"r1","original_text":"a","suggested_text":"b2","severity":"high"}),
            )
            .expect("rescore r1");
        assert_eq!(changed.replacement, "b2");
        assert_eq!(changed.severity.as_deref(), Some("high"));

        let snapshot = agg.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "r1");
        assert_eq!(snapshot[0].order, 0);
        assert_eq!(snapshot[0].replacement, "b2");
    }

    #[test]
    fn missing_id_falls_back_to_local_counter() {
        let mut agg = SuggestionAggregator::new();
        let first = agg
            .upsert_unit(
                SuggestionKind::Risk,
                &json!({"original_text":"x","suggested_text":"y"}),
            )
            .expect("unit");
        let second = agg
            .upsert_unit(
                SuggestionKind::Risk,
                &json!({"original_text":"p","suggested_text":"q"}),
            )
            .expect("unit");
        assert_eq!(first.id, "local-0");
        assert_eq!(second.id, "local-1");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn answer_updates_matching_question_in_place() {
        let mut agg = SuggestionAggregator::new();
        agg.upsert_unit(
            SuggestionKind::Question,
            &json!({"id":"q1","question":"What is the governing law?"}),
        )
        .expect("question");

        let answered = agg
            .upsert_unit(
                SuggestionKind::Answer,
                &json!({"question_id":"q1","answer":"Delaware"}),
            )
            .expect("answer routed to question");
        assert_eq!(answered.id, "q1");
        assert_eq!(answered.kind, SuggestionKind::Question);
        assert_eq!(answered.replacement, "Delaware");
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn unmatched_answer_appends_standalone_suggestion() {
        let mut agg = SuggestionAggregator::new();
        let answer = agg
            .upsert_unit(
                SuggestionKind::Answer,
                &json!({"question_id":"missing","answer":"n/a"}),
            )
            .expect("standalone answer");
        assert_eq!(answer.kind, SuggestionKind::Answer);
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn mark_transitions_applied_state() {
        let mut agg = SuggestionAggregator::new();
        agg.upsert_unit(
            SuggestionKind::Risk,
            &json!({"id":"r1","original_text":"a","suggested_text":"b"}),
        )
        .expect("unit");

        assert!(agg.mark("r1", AppliedState::Applied));
        assert_eq!(agg.get("r1").map(|s| s.state), Some(AppliedState::Applied));
        assert!(!agg.mark("nope", AppliedState::Dismissed));
    }

    #[test]
    fn unit_without_usable_text_is_rejected() {
        let mut agg = SuggestionAggregator::new();
        assert!(
            agg.upsert_unit(SuggestionKind::Risk, &json!({"id":"r1"}))
                .is_none()
        );
        assert!(agg.is_empty());
    }
}
