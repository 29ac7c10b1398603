use std::fmt;
use std::pin::Pin;

use crate::errors::SourceError;

/// Stable identifier for a registered suggestion source (for example `risk`
/// or `jurisdiction`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    /// Creates a source id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the source id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Raw byte stream delivered by a source, in arbitrarily-sized chunks.
pub type SourceByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, SourceError>> + Send + 'static>>;

/// Handle wrapping one open stream connection.
///
/// Dropping the handle releases the underlying connection.
pub struct SourceStreamHandle {
    pub stream: SourceByteStream,
}

/// Analysis request forwarded to the upstream endpoint as JSON.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisRequest {
    /// Plain text of the document under review.
    pub document_text: String,
    /// Target jurisdiction for jurisdiction-change streams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    /// Free-form reviewer instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl AnalysisRequest {
    pub fn new(document_text: impl Into<String>) -> Self {
        Self {
            document_text: document_text.into(),
            jurisdiction: None,
            instructions: None,
        }
    }

    pub fn jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Contract implemented by suggestion stream providers (HTTP endpoints, test
/// fakes).
#[async_trait::async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Returns the stable id this source registers under.
    fn id(&self) -> SourceId;

    /// Opens one streaming analysis exchange.
    async fn open_stream(&self, request: AnalysisRequest)
    -> Result<SourceStreamHandle, SourceError>;
}
