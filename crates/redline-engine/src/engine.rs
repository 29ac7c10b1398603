use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{EngineError, StreamFailure};
use crate::event::StreamSummary;
use crate::router::{CompleteCallback, ErrorCallback, EventRouter, ProgressCallback};
use crate::session::{Session, SessionConfig, SessionShared, SessionState, run_session};
use crate::source::{AnalysisRequest, SourceId, SuggestionSource};
use crate::suggestion::{Suggestion, SuggestionAggregator};

pub(crate) struct EngineInner {
    sources: HashMap<SourceId, Arc<dyn SuggestionSource>>,
}

impl EngineInner {
    pub(crate) fn source(&self, id: &SourceId) -> Option<Arc<dyn SuggestionSource>> {
        self.sources.get(id).cloned()
    }
}

/// Entry point for opening streaming suggestion sessions.
#[derive(Clone)]
pub struct SuggestEngine {
    inner: Arc<EngineInner>,
}

impl SuggestEngine {
    /// Starts a builder for registering sources and creating an engine.
    pub fn builder() -> SuggestEngineBuilder {
        SuggestEngineBuilder::default()
    }

    /// Starts building a session against a registered source.
    pub fn session(&self, config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(self.inner.clone(), config)
    }
}

/// Builder used to register suggestion sources before creating an engine.
#[derive(Default)]
pub struct SuggestEngineBuilder {
    sources: Vec<Arc<dyn SuggestionSource>>,
}

impl SuggestEngineBuilder {
    /// Registers a suggestion source.
    ///
    /// Register one source per analysis endpoint (for example `risk` and
    /// `jurisdiction`).
    pub fn register_source(mut self, source: Arc<dyn SuggestionSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Builds the engine and validates source registration.
    pub fn build(self) -> Result<SuggestEngine, EngineError> {
        let mut map: HashMap<SourceId, Arc<dyn SuggestionSource>> = HashMap::new();
        let mut seen: HashSet<SourceId> = HashSet::new();
        for source in self.sources {
            let id = source.id();
            if !seen.insert(id.clone()) {
                return Err(EngineError::Config(format!(
                    "duplicate source registration: {id}"
                )));
            }
            map.insert(id, source);
        }
        Ok(SuggestEngine {
            inner: Arc::new(EngineInner { sources: map }),
        })
    }
}

/// Builder for configuring and opening a single streaming session.
///
/// This is the main caller-facing API: pick a source, provide the analysis
/// request and the three callbacks, then `open()`.
pub struct SessionBuilder {
    inner: Arc<EngineInner>,
    config: SessionConfig,
    source_id: Option<SourceId>,
    request: Option<AnalysisRequest>,
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
}

impl SessionBuilder {
    pub(crate) fn new(inner: Arc<EngineInner>, config: SessionConfig) -> Self {
        Self {
            inner,
            config,
            source_id: None,
            request: None,
            on_progress: None,
            on_complete: None,
            on_error: None,
        }
    }

    /// Selects the registered source to stream from.
    pub fn source(mut self, id: impl Into<SourceId>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    /// Sets the analysis request payload.
    pub fn request(mut self, request: AnalysisRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Invoked per new/changed suggestion with the delta and the running
    /// snapshot.
    pub fn on_progress(mut self, f: impl FnMut(&Suggestion, &[Suggestion]) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Invoked exactly once with the final aggregate.
    pub fn on_complete(mut self, f: impl FnOnce(StreamSummary) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Invoked exactly once on transport or upstream failure.
    pub fn on_error(mut self, f: impl FnOnce(StreamFailure) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Validates the builder state and opens the session.
    ///
    /// Connection establishment happens inside the spawned pump task;
    /// connect failures surface through `on_error` with the session moving
    /// to `Errored`, matching mid-stream transport failures. Must be called
    /// within a tokio runtime.
    pub fn open(self) -> Result<Session, EngineError> {
        let source_id = self
            .source_id
            .ok_or_else(|| EngineError::Validation("session source must be set".into()))?;
        let request = self
            .request
            .ok_or_else(|| EngineError::Validation("analysis request must be set".into()))?;
        if request.document_text.trim().is_empty() {
            return Err(EngineError::Validation(
                "document text must not be empty".into(),
            ));
        }
        let source = self
            .inner
            .source(&source_id)
            .ok_or(EngineError::SourceNotFound { source_id })?;

        let shared = Arc::new(Mutex::new(SessionShared {
            state: SessionState::Idle,
            aggregator: SuggestionAggregator::new(),
            progress: None,
        }));
        let router = EventRouter::new(
            shared.clone(),
            self.on_progress,
            self.on_complete,
            self.on_error,
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let session_id = Uuid::new_v4();
        debug!(session_id = %session_id, session = %self.config.name, "opening session");

        tokio::spawn(run_session(
            session_id,
            source,
            request,
            router,
            shared.clone(),
            cancel_rx,
            done_tx,
            self.config.timeout,
        ));

        Ok(Session::new(
            session_id,
            self.config.name,
            shared,
            cancel_tx,
            done_rx,
        ))
    }
}
