//! Feed handles and the shared fetch/parse path.
//!
//! A [`FeedSource`] is either a URL resolved from the manifest or an
//! in-memory handle supplied up front (offline/pre-fetched mode). Both
//! funnel through [`fetch_json`], which bounds every network read with a
//! timeout and a response size cap.

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_FEED_SIZE: usize = 5 * 1024 * 1024; // 5MB

// ============================================================================
// Error Types
// ============================================================================

/// Errors from fetching or parsing a single feed payload.
///
/// Shared by discovery and the refresh pass; both wrap it in their own
/// error type.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 10-second timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the 5MB size limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Payload was not the expected GBFS-shaped JSON
    #[error("invalid feed JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// A pre-supplied handle failed to produce its text
    #[error("failed to read feed contents: {0}")]
    LocalRead(#[source] std::io::Error),
}

// ============================================================================
// Feed Handles
// ============================================================================

/// An in-memory feed payload readable as full text.
///
/// The layer's offline mode accepts anything implementing this; the
/// provided [`FeedFile`] covers the common case of pre-fetched strings.
#[async_trait]
pub trait FeedText: Send + Sync {
    /// File name used to match the handle to a feed role
    /// (e.g. `station_status.json`).
    fn name(&self) -> &str;

    /// Read the complete feed payload.
    async fn text(&self) -> std::io::Result<String>;
}

/// A named, pre-fetched feed payload held in memory.
#[derive(Debug, Clone)]
pub struct FeedFile {
    pub name: String,
    contents: String,
}

impl FeedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

#[async_trait]
impl FeedText for FeedFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn text(&self) -> std::io::Result<String> {
        Ok(self.contents.clone())
    }
}

/// Where one sub-feed's payload comes from. Immutable once assigned to a
/// feed role by discovery.
#[derive(Clone)]
pub enum FeedSource {
    /// Network-resolved: fetched fresh on every read.
    Url(Url),
    /// Pre-supplied handle read without network access.
    Local(Arc<dyn FeedText>),
}

impl fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Url(url) => f.debug_tuple("Url").field(&url.as_str()).finish(),
            FeedSource::Local(text) => f.debug_tuple("Local").field(&text.name()).finish(),
        }
    }
}

// ============================================================================
// Fetching
// ============================================================================

/// Fetch a feed payload from its source and parse it as JSON.
///
/// # Errors
///
/// - [`FetchError::Timeout`] / [`FetchError::Network`] /
///   [`FetchError::HttpStatus`] / [`FetchError::ResponseTooLarge`] for URL
///   sources
/// - [`FetchError::LocalRead`] for pre-supplied handles
/// - [`FetchError::Parse`] when the payload is not valid JSON of the
///   expected shape
pub async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    source: &FeedSource,
) -> Result<T, FetchError> {
    match source {
        FeedSource::Url(url) => {
            let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url.clone()).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::Network)?;

            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
            Ok(serde_json::from_slice(&bytes)?)
        }
        FeedSource::Local(text) => {
            let contents = text.text().await.map_err(FetchError::LocalRead)?;
            Ok(serde_json::from_str(&contents)?)
        }
    }
}

/// Reads a response body with a size limit using stream-based reading.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

// ============================================================================
// Tests
// ============================================================================
