use std::collections::BTreeMap;

use crate::errors::StreamFailure;
use crate::suggestion::{Suggestion, SuggestionKind};

/// Decoded stream events, one per well-formed frame.
///
/// Events are ephemeral: produced by the decoder, consumed immediately by the
/// router, never persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// First event for every analysis stream.
    Started { message: String },
    /// One discovered (or re-stated) suggestion unit.
    Unit {
        kind: SuggestionKind,
        payload: serde_json::Value,
    },
    /// Step/page-boundary marker emitted between analysis passes.
    Progress { step: Option<u64>, message: String },
    /// Terminal success event with upstream totals (`total_*` fields).
    Completed {
        message: String,
        totals: BTreeMap<String, u64>,
    },
    /// Terminal failure reported by the upstream service.
    Failed { error: StreamFailure },
}

/// Final aggregate handed to the completion callback.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StreamSummary {
    /// Upstream completion message.
    pub message: String,
    /// Upstream `total_*` counters, keyed without the prefix stripped.
    pub totals: BTreeMap<String, u64>,
    /// All suggestions in arrival order.
    pub suggestions: Vec<Suggestion>,
}
