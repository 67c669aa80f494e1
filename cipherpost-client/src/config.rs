//! Client configuration.

use crate::error::{ClientError, ClientResult};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Largest attachment the server accepts, in bytes.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10_000_000;

/// Configuration for the API client and message services.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the messaging API (e.g., "http://localhost:8000").
    pub api_base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound for a single plaintext attachment.
    pub max_attachment_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        let url = self.api_base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "api_base_url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_attachment_bytes == 0 {
            return Err(ClientError::Config(
                "max_attachment_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Joins `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }

    /// Joins `path` onto the base URL and appends `segment` as a single
    /// percent-encoded path segment, so `/`, `?` and `%` in user input
    /// cannot reach another route.
    pub fn endpoint_with_segment(&self, path: &str, segment: &str) -> ClientResult<Url> {
        if matches!(segment, "" | "." | "..") {
            return Err(ClientError::NotFound(format!("{path}/{segment}")));
        }
        let mut url = Url::parse(&self.endpoint(path))
            .map_err(|e| ClientError::Config(format!("invalid endpoint URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("api_base_url cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }
}
