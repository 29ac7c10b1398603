//! HTTP suggestion source.
//!
//! One source instance corresponds to one analysis endpoint (risk review,
//! jurisdiction change, questions); register several instances for a product
//! with several streams.

use std::time::Duration;

use futures::TryStreamExt as _;
use tracing::debug;

use crate::errors::{EngineError, SourceError};
use crate::source::{AnalysisRequest, SourceId, SourceStreamHandle, SuggestionSource};

/// Configuration shared by HTTP suggestion sources.
#[derive(Clone, Debug)]
pub struct HttpSourceConfig {
    /// Base URL of the document-analysis service.
    pub base_url: String,
    /// Optional bearer token.
    pub auth_token: Option<String>,
    /// HTTP timeout covering the whole streaming request.
    pub timeout: Duration,
}

impl HttpSourceConfig {
    /// Creates a config with sensible defaults and a provided base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `REDLINE_API_BASE_URL` and `REDLINE_API_TOKEN`.
    pub fn from_env() -> Result<Self, EngineError> {
        let base_url = std::env::var("REDLINE_API_BASE_URL").unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(EngineError::Config(
                "missing REDLINE_API_BASE_URL for HTTP suggestion source".into(),
            ));
        }
        let mut config = Self::new(base_url);
        if let Ok(token) = std::env::var("REDLINE_API_TOKEN")
            && !token.trim().is_empty()
        {
            config.auth_token = Some(token);
        }
        Ok(config)
    }

    /// Sets the bearer token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Suggestion source streaming frames from one HTTP analysis endpoint.
pub struct HttpSuggestionSource {
    id: SourceId,
    path: String,
    client: reqwest::Client,
    config: HttpSourceConfig,
}

impl HttpSuggestionSource {
    /// Creates a source for one endpoint path, for example a `risk` source at
    /// `/api/analysis/risks/stream`.
    pub fn new(
        id: impl Into<SourceId>,
        path: impl Into<String>,
        config: HttpSourceConfig,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            id: id.into(),
            path: path.into(),
            client,
            config,
        })
    }
}

#[async_trait::async_trait]
impl SuggestionSource for HttpSuggestionSource {
    fn id(&self) -> SourceId {
        self.id.clone()
    }

    async fn open_stream(
        &self,
        request: AnalysisRequest,
    ) -> Result<SourceStreamHandle, SourceError> {
        let url = self.config.endpoint_url(&self.path);
        debug!(source = %self.id, %url, "opening suggestion stream");

        let mut http_req = self.client.post(&url).json(&request);
        if let Some(token) = self.config.auth_token.as_ref() {
            http_req = http_req.bearer_auth(token);
        }

        let response = http_req.send().await.map_err(|e| {
            SourceError::transport(self.id.clone(), format!("analysis request failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SourceError::upstream(
                self.id.clone(),
                format!("analysis request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let source_id = self.id.clone();
        let stream = response.bytes_stream().map_err(move |e| {
            SourceError::transport(source_id.clone(), format!("streaming read failed: {e}"))
        });
        Ok(SourceStreamHandle {
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_without_duplicate_slashes() {
        let config = HttpSourceConfig::new("https://api.example.com/");
        assert_eq!(
            config.endpoint_url("/api/analysis/risks/stream"),
            "https://api.example.com/api/analysis/risks/stream"
        );
        assert_eq!(
            config.endpoint_url("api/analysis/risks/stream"),
            "https://api.example.com/api/analysis/risks/stream"
        );
    }

    #[test]
    fn config_builders_override_defaults() {
        let config = HttpSourceConfig::new("https://api.example.com")
            .auth_token("secret")
            .timeout(Duration::from_secs(10));
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn source_reports_its_registered_id() {
        let source = HttpSuggestionSource::new(
            "risk",
            "/api/analysis/risks/stream",
            HttpSourceConfig::new("https://api.example.com"),
        )
        .expect("source");
        assert_eq!(source.id(), SourceId::new("risk"));
    }
}
