use crate::source::SourceId;

/// Errors returned by a suggestion source before they are normalized into a
/// terminal `StreamFailure` for the session callbacks.
///
/// The field is `source_id`, not `source`: thiserror reserves a field named
/// `source` for the error cause and `SourceId` is not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Upstream returned an application-level failure (HTTP status, auth, etc.).
    #[error("upstream error ({source_id}): {message}")]
    Upstream {
        source_id: SourceId,
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error ({source_id}): {message}")]
    Transport { source_id: SourceId, message: String },
    /// Response shape or event sequencing was invalid.
    #[error("protocol error ({source_id}): {message}")]
    Protocol { source_id: SourceId, message: String },
}

impl SourceError {
    /// Creates an upstream-level error.
    pub fn upstream(
        source_id: impl Into<SourceId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Upstream {
            source_id: source_id.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(source_id: impl Into<SourceId>, message: impl Into<String>) -> Self {
        Self::Transport {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(source_id: impl Into<SourceId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Returns the source associated with this error.
    pub fn source_id(&self) -> &SourceId {
        match self {
            Self::Upstream { source_id, .. }
            | Self::Transport { source_id, .. }
            | Self::Protocol { source_id, .. } => source_id,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Upstream { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }
}

/// Terminal session failure delivered through the `on_error` callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamFailure {
    /// Upstream reported a failure inside the stream (`status: "error"`).
    #[error("upstream failure: {message}")]
    Upstream { message: String },
    /// Network/stream transport failed.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// The engine detected a protocol or invariant error.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
    /// The session was cancelled by the caller.
    #[error("session cancelled")]
    Cancelled,
}

/// Top-level error type for the public engine API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Invalid engine/source configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// Requested source is not registered in the engine.
    #[error("source not found: {source_id}")]
    SourceNotFound { source_id: SourceId },
    /// Source error surfaced outside a running session.
    #[error(transparent)]
    Source(SourceError),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub(crate) fn stream_failure_from_source_error(err: &SourceError) -> StreamFailure {
    match err {
        SourceError::Upstream { message, .. } => StreamFailure::Upstream {
            message: message.clone(),
        },
        SourceError::Transport { message, .. } => StreamFailure::Transport {
            message: message.clone(),
        },
        SourceError::Protocol { source_id, message } => StreamFailure::Protocol {
            message: format!("source={source_id}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The id-carrying variants must keep deriving Error: a field literally
    // named `source` would be claimed as the error cause and fail the derive.
    #[test]
    fn id_carrying_errors_derive_error_without_a_cause() {
        let upstream = SourceError::upstream("risk", "denied", Some(403));
        assert_eq!(upstream.to_string(), "upstream error (risk): denied");
        assert!(std::error::Error::source(&upstream).is_none());

        let transport = SourceError::transport("risk", "reset");
        assert_eq!(transport.to_string(), "transport error (risk): reset");
        assert!(std::error::Error::source(&transport).is_none());

        let not_found = EngineError::SourceNotFound {
            source_id: SourceId::new("jurisdiction"),
        };
        assert_eq!(not_found.to_string(), "source not found: jurisdiction");
        assert!(std::error::Error::source(&not_found).is_none());
    }

    #[test]
    fn source_errors_normalize_to_stream_failures() {
        let err = SourceError::protocol("risk", "bad frame");
        assert_eq!(err.source_id(), &SourceId::new("risk"));
        assert_eq!(
            stream_failure_from_source_error(&err),
            StreamFailure::Protocol {
                message: "source=risk: bad frame".into()
            }
        );
    }
}
