use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::decoder::FrameDecoder;
use crate::errors::{StreamFailure, stream_failure_from_source_error};
use crate::router::{EventRouter, Routed};
use crate::source::{AnalysisRequest, SuggestionSource};
use crate::suggestion::{AppliedState, Suggestion, SuggestionAggregator};

/// Session lifecycle states.
///
/// Transitions are monotonic (`idle → streaming → terminal`) and terminal
/// states are sticky: no event is processed after one is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, connection not yet opened.
    Idle,
    /// Chunks are actively pumped through decode → route → aggregate.
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

/// Most recent step/page-boundary marker seen on the stream.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProgressMark {
    pub step: Option<u64>,
    pub message: String,
}

pub(crate) struct SessionShared {
    pub state: SessionState,
    pub aggregator: SuggestionAggregator,
    pub progress: Option<ProgressMark>,
}

pub(crate) fn lock(shared: &Arc<Mutex<SessionShared>>) -> MutexGuard<'_, SessionShared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Configuration used to create a `Session`.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Human-readable session name (useful for logs).
    pub name: String,
    /// Optional whole-session watchdog. `None` means no intrinsic timeout.
    pub timeout: Option<Duration>,
}

impl SessionConfig {
    /// Creates a named session config.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: None,
        }
    }

    /// Sets a watchdog covering the whole session lifecycle.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Handle to one streaming analysis session.
///
/// Sessions are fully independent of each other: separate decoders,
/// aggregators, and connections. The accumulated snapshot stays readable
/// after any terminal state, including cancellation (best-effort partial
/// results).
pub struct Session {
    id: Uuid,
    name: String,
    shared: Arc<Mutex<SessionShared>>,
    cancel_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Session {
    pub(crate) fn new(
        id: Uuid,
        name: String,
        shared: Arc<Mutex<SessionShared>>,
        cancel_tx: watch::Sender<bool>,
        done_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            name,
            shared,
            cancel_tx,
            done_rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared).state
    }

    /// Returns the accumulated suggestions in arrival order.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        lock(&self.shared).aggregator.snapshot()
    }

    pub fn suggestion(&self, id: &str) -> Option<Suggestion> {
        lock(&self.shared).aggregator.get(id).cloned()
    }

    /// Returns the most recent step/page-boundary marker, if any.
    pub fn progress(&self) -> Option<ProgressMark> {
        lock(&self.shared).progress.clone()
    }

    /// Sets the applied-state of one suggestion (caller action only).
    pub fn mark(&self, id: &str, state: AppliedState) -> bool {
        lock(&self.shared).aggregator.mark(id, state)
    }

    /// Cancels the session: closes the connection and guarantees that no
    /// further callback invocation begins. A progress callback already
    /// executing on the pump task may still finish after this returns;
    /// terminal callbacks never fire once cancelled. No-op once terminal.
    pub fn cancel(&self) {
        {
            let mut shared = lock(&self.shared);
            if shared.state.is_terminal() {
                return;
            }
            shared.state = SessionState::Cancelled;
        }
        debug!(session_id = %self.id, "session cancelled");
        let _ = self.cancel_tx.send(true);
    }

    /// Waits until the pump task has stopped (any terminal state).
    pub async fn finished(&self) {
        let mut done = self.done_rx.clone();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Pump task: opens the connection and drives bytes through
/// decode → route → aggregate until a terminal event, a transport failure,
/// cancellation, or the watchdog.
pub(crate) async fn run_session(
    session_id: Uuid,
    source: Arc<dyn SuggestionSource>,
    request: AnalysisRequest,
    mut router: EventRouter,
    shared: Arc<Mutex<SessionShared>>,
    mut cancel_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
    timeout: Option<Duration>,
) {
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    pump(
        session_id,
        source,
        request,
        &mut router,
        &shared,
        &mut cancel_rx,
        deadline,
    )
    .await;
    let _ = done_tx.send(true);
}

async fn pump(
    session_id: Uuid,
    source: Arc<dyn SuggestionSource>,
    request: AnalysisRequest,
    router: &mut EventRouter,
    shared: &Arc<Mutex<SessionShared>>,
    cancel_rx: &mut watch::Receiver<bool>,
    deadline: Option<tokio::time::Instant>,
) {
    let opened = tokio::select! {
        _ = cancelled(cancel_rx) => {
            debug!(session_id = %session_id, "cancelled before connection opened");
            return;
        }
        _ = watchdog(deadline) => {
            router.fail(StreamFailure::Transport {
                message: "session watchdog timeout while connecting".into(),
            });
            return;
        }
        opened = source.open_stream(request) => opened,
    };

    let handle = match opened {
        Ok(handle) => handle,
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "failed to open suggestion stream");
            router.fail(stream_failure_from_source_error(&err));
            return;
        }
    };

    {
        let mut shared = lock(shared);
        if shared.state.is_terminal() {
            return;
        }
        shared.state = SessionState::Streaming;
    }
    debug!(session_id = %session_id, "suggestion stream open");

    let mut stream = handle.stream;
    let mut decoder = FrameDecoder::new();
    loop {
        tokio::select! {
            _ = cancelled(cancel_rx) => {
                debug!(session_id = %session_id, "cancelled mid-stream");
                return;
            }
            _ = watchdog(deadline) => {
                router.fail(StreamFailure::Transport {
                    message: "session watchdog timeout".into(),
                });
                return;
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    for event in decoder.push_chunk(&chunk) {
                        if router.route(event) == Routed::Terminal {
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    router.fail(stream_failure_from_source_error(&err));
                    return;
                }
                None => {
                    for event in decoder.finish() {
                        if router.route(event) == Routed::Terminal {
                            return;
                        }
                    }
                    router.fail(StreamFailure::Protocol {
                        message: "stream ended without a terminal event".into(),
                    });
                    return;
                }
            }
        }
    }
}

async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    if *cancel_rx.borrow_and_update() {
        return;
    }
    while cancel_rx.changed().await.is_ok() {
        if *cancel_rx.borrow() {
            return;
        }
    }
    // sender dropped without a cancel; never resolve
    std::future::pending::<()>().await
}

async fn watchdog(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_terminal() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Errored.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }

    #[test]
    fn session_config_builder_sets_watchdog() {
        let config = SessionConfig::named("risk-review").timeout(Duration::from_secs(30));
        assert_eq!(config.name, "risk-review");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }
}
