//! Transport seam
//!
//! The core never talks HTTP directly. Every logical fetch is one call to
//! [`Transport::get`], which returns the raw body with its declared content type.

use async_trait::async_trait;
use bytes::Bytes;

pub mod endpoints;
pub mod http;

pub use endpoints::Endpoints;
pub use http::HttpTransport;

/// Transport errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Network error (connection, timeout, body read)
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Provider answered with an error message instead of data
    #[error("API error: {0}")]
    Api(String),

    /// Request could not be built (bad header value, bad URL)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Raw response body
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Media type without parameters, lowercased (e.g. `application/json`)
    pub content_type: Option<String>,
    /// Response body
    pub body: Bytes,
}

impl Payload {
    /// Build a payload, normalizing the content type
    pub fn new(content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.map(media_type),
            body: body.into(),
        }
    }

    /// JSON payload
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::new(Some("application/json"), body)
    }

    /// Zip payload
    pub fn zip(body: impl Into<Bytes>) -> Self {
        Self::new(Some("application/zip"), body)
    }

    /// XML payload
    pub fn xml(body: impl Into<Bytes>) -> Self {
        Self::new(Some("application/xml"), body)
    }

    /// True if the declared media type is JSON
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct == "application/json" || ct.ends_with("+json"))
    }
}

/// Strip parameters and lowercase a `Content-Type` value
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// One GET per logical fetch, authenticated by the implementation
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `path` (relative to the API base URL) with query parameters
    ///
    /// # Errors
    /// Returns [`TransportError`] on network failure or non-success status.
    async fn get(&self, path: &str, params: &[(&str, String)]) -> TransportResult<Payload>;
}
