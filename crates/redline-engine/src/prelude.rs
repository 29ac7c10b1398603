//! Common imports for typical engine usage.
//!
//! This module intentionally exports the most frequently used builder/runtime
//! types so examples and application code need fewer import lines.
pub use crate::{
    AnalysisRequest, AppliedState, ApplyOutcome, EngineError, Session, SessionConfig,
    SessionState, SourceId, StreamFailure, StreamSummary, SuggestEngine, SuggestEngineBuilder,
    Suggestion, SuggestionKind, apply_all, apply_suggestion, locate,
};
