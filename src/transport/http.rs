//! ESIOS HTTP transport
//!
//! Default [`Transport`] built on reqwest:
//! - token authentication and JSON accept headers on every request
//! - retry with exponential backoff on network errors, 429 and 5xx
//! - provider error bodies (`{"message": ...}`) surfaced as errors

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use super::{Payload, Transport, TransportError, TransportResult};
use crate::config::{calculate_backoff, ClientConfig, ConfigError};

const ACCEPT_VALUE: &str = "application/json; application/vnd.esios-api-v1+json";

/// Longest error body kept in [`TransportError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Authenticated HTTP client for the ESIOS API
pub struct HttpTransport {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl HttpTransport {
    /// Create the transport from configuration
    ///
    /// # Errors
    /// Fails when no token is configured or the token is not a valid header value.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let token = config.token()?;
        let headers = Self::default_headers(token)?;

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retry budget for transient failures
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn default_headers(token: &str) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Token token=\"{token}\""))
            .map_err(|e| ConfigError::InvalidValue(format!("token is not a valid header: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    /// Send with retry (network errors, 429, 5xx); 4xx other than 429 fail at once
    async fn request_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> TransportResult<Response> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let response = match self.client.get(url).query(params).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(
                        "Network error on attempt {}/{}: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(TransportError::Network(e.to_string()));
                    if attempt < self.max_retries {
                        let backoff = calculate_backoff(attempt);
                        debug!("Retrying after {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                warn!(
                    "HTTP {} on attempt {}/{}",
                    status,
                    attempt + 1,
                    self.max_retries + 1
                );
                last_error = Some(TransportError::Status {
                    status: status.as_u16(),
                    body: Self::error_body(response).await,
                });
                if attempt < self.max_retries {
                    let backoff = calculate_backoff(attempt);
                    debug!("Retrying after {:?}", backoff);
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }

            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body: Self::error_body(response).await,
                });
            }

            debug!("Request succeeded on attempt {}", attempt + 1);
            return Ok(response);
        }

        Err(last_error
            .unwrap_or_else(|| TransportError::Network("All retries exhausted".to_string())))
    }

    async fn error_body(response: Response) -> String {
        let mut body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        body
    }
}

/// Detect a `{"message": "..."}` error document returned with a success status
pub(crate) fn provider_error(payload: &Payload) -> Option<String> {
    if !payload.is_json() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_slice(&payload.body).ok()?;
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get("message")?.as_str().map(str::to_string)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> TransportResult<Payload> {
        if !path.starts_with('/') {
            return Err(TransportError::InvalidRequest(format!(
                "path must start with '/': {path}"
            )));
        }
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, params = params.len(), "GET");

        let response = self.request_with_retry(&url, params).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let payload = Payload::new(content_type.as_deref(), body);
        if let Some(message) = provider_error(&payload) {
            return Err(TransportError::Api(message));
        }

        debug!(
            url = %url,
            bytes = payload.body.len(),
            content_type = payload.content_type.as_deref().unwrap_or("-"),
            "Response received"
        );
        Ok(payload)
    }
}
