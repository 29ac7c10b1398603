use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::errors::StreamFailure;
use crate::event::{StreamEvent, StreamSummary};
use crate::session::{ProgressMark, SessionShared, SessionState, lock};
use crate::suggestion::Suggestion;

/// Invoked for every new or changed suggestion with the delta and the full
/// accumulated snapshot, supporting incremental or batch rendering.
pub type ProgressCallback = Box<dyn FnMut(&Suggestion, &[Suggestion]) + Send>;
/// Invoked exactly once on stream completion with the final aggregate.
pub type CompleteCallback = Box<dyn FnOnce(StreamSummary) + Send>;
/// Invoked exactly once on transport or upstream failure.
pub type ErrorCallback = Box<dyn FnOnce(StreamFailure) + Send>;

/// Routing verdict for the pump loop.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Routed {
    Continue,
    /// The session reached (or already was in) a terminal state.
    Terminal,
}

/// Classifies decoded events, updates the aggregator, and invokes the
/// caller's callbacks.
///
/// Terminal callbacks fire at most once; every event arriving after a
/// terminal state is dropped. Side effects are limited to the callbacks —
/// the router never touches document content.
pub(crate) struct EventRouter {
    shared: Arc<Mutex<SessionShared>>,
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
}

impl EventRouter {
    pub(crate) fn new(
        shared: Arc<Mutex<SessionShared>>,
        on_progress: Option<ProgressCallback>,
        on_complete: Option<CompleteCallback>,
        on_error: Option<ErrorCallback>,
    ) -> Self {
        Self {
            shared,
            on_progress,
            on_complete,
            on_error,
        }
    }

    pub(crate) fn route(&mut self, event: StreamEvent) -> Routed {
        match event {
            StreamEvent::Started { message } => {
                let shared = lock(&self.shared);
                if shared.state.is_terminal() {
                    return Routed::Terminal;
                }
                debug!(%message, "analysis stream started");
                Routed::Continue
            }
            StreamEvent::Progress { step, message } => {
                let mut shared = lock(&self.shared);
                if shared.state.is_terminal() {
                    return Routed::Terminal;
                }
                shared.progress = Some(ProgressMark { step, message });
                Routed::Continue
            }
            StreamEvent::Unit { kind, payload } => {
                // Aggregator update and terminal check happen under one lock;
                // the callback runs after it is released so a caller-supplied
                // closure can never block session accessors. A concurrent
                // cancel may land while the callback runs; it only prevents
                // the next callback from starting.
                let updated = {
                    let mut shared = lock(&self.shared);
                    if shared.state.is_terminal() {
                        debug!("dropping unit event after terminal state");
                        return Routed::Terminal;
                    }
                    match shared.aggregator.upsert_unit(kind, &payload) {
                        Some(changed) => {
                            let snapshot = shared.aggregator.snapshot();
                            Some((changed, snapshot))
                        }
                        None => {
                            debug!(?kind, "unit payload carried no usable text");
                            None
                        }
                    }
                };
                if let Some((changed, snapshot)) = updated
                    && let Some(on_progress) = self.on_progress.as_mut()
                {
                    on_progress(&changed, &snapshot);
                }
                Routed::Continue
            }
            StreamEvent::Completed { message, totals } => {
                let suggestions = {
                    let mut shared = lock(&self.shared);
                    if shared.state.is_terminal() {
                        return Routed::Terminal;
                    }
                    shared.state = SessionState::Completed;
                    shared.aggregator.snapshot()
                };
                if let Some(on_complete) = self.on_complete.take() {
                    on_complete(StreamSummary {
                        message,
                        totals,
                        suggestions,
                    });
                }
                Routed::Terminal
            }
            StreamEvent::Failed { error } => {
                self.fail(error);
                Routed::Terminal
            }
        }
    }

    /// Marks the session errored and fires `on_error` at most once.
    ///
    /// No-op when the session already reached a terminal state (a cancelled
    /// session never sees an error callback).
    pub(crate) fn fail(&mut self, failure: StreamFailure) {
        {
            let mut shared = lock(&self.shared);
            if shared.state.is_terminal() {
                return;
            }
            shared.state = SessionState::Errored;
        }
        if let Some(on_error) = self.on_error.take() {
            on_error(failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestion::{SuggestionAggregator, SuggestionKind};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared_state() -> Arc<Mutex<SessionShared>> {
        Arc::new(Mutex::new(SessionShared {
            state: SessionState::Streaming,
            aggregator: SuggestionAggregator::new(),
            progress: None,
        }))
    }

    fn unit(id: &str) -> StreamEvent {
        StreamEvent::Unit {
            kind: SuggestionKind::Risk,
            payload: json!({"id": id, "original_text": "a", "suggested_text": "b"}),
        }
    }

    fn completed() -> StreamEvent {
        StreamEvent::Completed {
            message: "done".into(),
            totals: BTreeMap::new(),
        }
    }

    #[test]
    fn progress_callback_receives_delta_and_snapshot() {
        let shared = shared_state();
        let seen: Arc<Mutex<Vec<(String, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let mut router = EventRouter::new(
            shared,
            Some(Box::new(move |changed, snapshot| {
                seen_cb
                    .lock()
                    .expect("callback mutex")
                    .push((changed.id.clone(), snapshot.len()));
            })),
            None,
            None,
        );

        assert_eq!(router.route(unit("r1")), Routed::Continue);
        assert_eq!(router.route(unit("r2")), Routed::Continue);
        let seen = seen.lock().expect("callback mutex");
        assert_eq!(*seen, vec![("r1".to_string(), 1), ("r2".to_string(), 2)]);
    }

    #[test]
    fn completion_callback_fires_exactly_once() {
        let shared = shared_state();
        let completions = Arc::new(AtomicUsize::new(0));
        let completions_cb = completions.clone();
        let mut router = EventRouter::new(
            shared.clone(),
            None,
            Some(Box::new(move |_summary| {
                completions_cb.fetch_add(1, Ordering::SeqCst);
            })),
            None,
        );

        assert_eq!(router.route(completed()), Routed::Terminal);
        assert_eq!(router.route(completed()), Routed::Terminal);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(lock(&shared).state, SessionState::Completed);
    }

    #[test]
    fn events_after_terminal_are_dropped() {
        let shared = shared_state();
        let progress_calls = Arc::new(AtomicUsize::new(0));
        let progress_cb = progress_calls.clone();
        let mut router = EventRouter::new(
            shared.clone(),
            Some(Box::new(move |_, _| {
                progress_cb.fetch_add(1, Ordering::SeqCst);
            })),
            None,
            None,
        );

        router.route(unit("r1"));
        router.route(completed());
        assert_eq!(router.route(unit("r2")), Routed::Terminal);
        assert_eq!(progress_calls.load(Ordering::SeqCst), 1);
        assert_eq!(lock(&shared).aggregator.len(), 1);
    }

    #[test]
    fn no_progress_callback_begins_after_cancel() {
        let shared = shared_state();
        lock(&shared).state = SessionState::Cancelled;
        let progress_calls = Arc::new(AtomicUsize::new(0));
        let progress_cb = progress_calls.clone();
        let mut router = EventRouter::new(
            shared,
            Some(Box::new(move |_, _| {
                progress_cb.fetch_add(1, Ordering::SeqCst);
            })),
            None,
            None,
        );

        assert_eq!(router.route(unit("r1")), Routed::Terminal);
        assert_eq!(progress_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failure_marks_session_errored_once() {
        let shared = shared_state();
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_cb = errors.clone();
        let mut router = EventRouter::new(
            shared.clone(),
            None,
            None,
            Some(Box::new(move |_failure| {
                errors_cb.fetch_add(1, Ordering::SeqCst);
            })),
        );

        router.fail(StreamFailure::Transport {
            message: "dropped".into(),
        });
        router.fail(StreamFailure::Transport {
            message: "again".into(),
        });
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(lock(&shared).state, SessionState::Errored);
    }

    #[test]
    fn cancelled_session_suppresses_error_callback() {
        let shared = shared_state();
        lock(&shared).state = SessionState::Cancelled;
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_cb = errors.clone();
        let mut router = EventRouter::new(
            shared,
            None,
            None,
            Some(Box::new(move |_failure| {
                errors_cb.fetch_add(1, Ordering::SeqCst);
            })),
        );

        router.fail(StreamFailure::Transport {
            message: "late".into(),
        });
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn boundary_marker_updates_progress() {
        let shared = shared_state();
        let mut router = EventRouter::new(shared.clone(), None, None, None);
        router.route(StreamEvent::Progress {
            step: Some(3),
            message: "page 3".into(),
        });
        let progress = lock(&shared).progress.clone().expect("progress mark");
        assert_eq!(progress.step, Some(3));
        assert_eq!(progress.message, "page 3");
    }
}
