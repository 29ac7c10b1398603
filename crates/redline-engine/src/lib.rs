//! Streaming suggestion engine for document redlining, with a builder-first
//! async API and a fuzzy text-patch pipeline for applying accepted edits to
//! markup documents.
//!
//! # Builder-first usage (HTTP source)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use redline_engine::http::{HttpSourceConfig, HttpSuggestionSource};
//! use redline_engine::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), EngineError> {
//! let config = HttpSourceConfig::from_env()?;
//! let engine = SuggestEngine::builder()
//!     .register_source(Arc::new(HttpSuggestionSource::new(
//!         "risk",
//!         "/api/analysis/risks/stream",
//!         config,
//!     )?))
//!     .build()?;
//!
//! let session = engine
//!     .session(SessionConfig::named("risk-review"))
//!     .source("risk")
//!     .request(AnalysisRequest::new("The term is thirty days."))
//!     .on_progress(|changed, snapshot| {
//!         println!("suggestion {} ({} total)", changed.id, snapshot.len());
//!     })
//!     .on_complete(|summary| println!("done: {}", summary.message))
//!     .on_error(|failure| eprintln!("stream failed: {failure}"))
//!     .open()?;
//!
//! session.finished().await;
//! # Ok(())
//! # }
//! ```

/// Suggestion application and batch patching.
pub mod apply;
/// Line-framed stream decoding.
pub mod decoder;
/// Engine entry point and session builder.
pub mod engine;
/// Public error types used by the engine API.
pub mod errors;
/// Normalized stream events and the completion summary.
pub mod event;
/// HTTP suggestion source.
pub mod http;
/// Fuzzy snippet location in markup documents.
pub mod locate;
/// Markup segmentation and entity decoding.
pub(crate) mod markup;
/// Process-wide logging initialization.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Session callback types and event routing.
pub mod router;
/// Session configuration, handle, and lifecycle.
pub mod session;
/// Suggestion source contract and request types.
pub mod source;
/// Suggestion types and per-session aggregation.
pub mod suggestion;

pub use apply::{ApplyOutcome, BatchEntry, apply_all, apply_suggestion};
pub use decoder::FrameDecoder;
pub use engine::{SessionBuilder, SuggestEngine, SuggestEngineBuilder};
pub use errors::{EngineError, SourceError, StreamFailure};
pub use event::{StreamEvent, StreamSummary};
pub use locate::{LocatedMatch, Strategy, locate};
pub use observability::init_observability;
pub use router::{CompleteCallback, ErrorCallback, ProgressCallback};
pub use session::{ProgressMark, Session, SessionConfig, SessionState};
pub use source::{AnalysisRequest, SourceByteStream, SourceId, SourceStreamHandle, SuggestionSource};
pub use suggestion::{AppliedState, Suggestion, SuggestionKind};
